use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Upload cap for both HTTP services: 64 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlterConfig {
    pub server: ServerConfig,
    pub user: UserConfigPaths,
    pub model: ModelConfig,
    pub memory: MemoryConfig,
    pub retrieval: RetrievalConfig,
    pub chat: ChatConfig,
    pub reminder: ReminderConfig,
    pub summary: SummaryConfig,
    pub notify: NotifyConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Request body cap for `/api/documents` uploads.
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UserConfigPaths {
    /// JSON file holding `{name, bio}`.
    pub config_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub num_ctx: u32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    /// `"sqlite"`, `"file"` or `"service"`.
    pub backend: String,
    pub db_path: String,
    pub profile_path: String,
    pub service_url: String,
    pub service_api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub enabled: bool,
    pub docs_dir: String,
    pub top_k: usize,
    pub chunk_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub history_turns: usize,
    pub profile_limit: usize,
    /// Used when the profile store has nothing relevant. `{name}` and `{bio}` are substituted.
    pub default_persona: String,
    pub rules: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub poll_secs: u64,
    pub hour: u32,
    pub query: String,
    pub keyword: String,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SummaryConfig {
    pub enabled: bool,
    pub poll_secs: u64,
    pub query: String,
    pub limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub app_name: String,
    pub timeout_secs: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub claude_model: String,
    pub openai_model: String,
    pub transcription_model: String,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub timeout_secs: u64,
    /// Request body cap for `/api/score` uploads.
    pub max_upload_bytes: usize,
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    #[serde(skip)]
    pub anthropic_api_key: Option<String>,
    #[serde(skip)]
    pub transcription_url: Option<String>,
    #[serde(skip)]
    pub scoring_url: Option<String>,
    #[serde(skip)]
    pub scoring_api_key: Option<String>,
}

impl Default for AlterConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            user: UserConfigPaths::default(),
            model: ModelConfig::default(),
            memory: MemoryConfig::default(),
            retrieval: RetrievalConfig::default(),
            chat: ChatConfig::default(),
            reminder: ReminderConfig::default(),
            summary: SummaryConfig::default(),
            notify: NotifyConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7860,
            log_level: "info".into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for UserConfigPaths {
    fn default() -> Self {
        Self {
            config_path: alter_path("user_config.json"),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            base_url: "http://127.0.0.1:11434".into(),
            model: "qwen3:4b".into(),
            temperature: 0.6,
            num_ctx: 2048,
            top_p: 0.9,
            timeout_secs: 120,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".into(),
            db_path: alter_path("memory.db"),
            profile_path: alter_path("user_profile.txt"),
            service_url: "http://127.0.0.1:8888".into(),
            service_api_key: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            docs_dir: alter_path("docs"),
            top_k: 4,
            chunk_chars: 1000,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_turns: 10,
            profile_limit: 5,
            default_persona: "I am {name}. {bio}".into(),
            rules: vec![
                "Do not make things up; stay grounded in the facts above.".into(),
                "Be concise: 150 words at most.".into(),
                "Tone: calm and restrained, with genuine care, like a note written to yourself."
                    .into(),
                "Purpose: look after me, remind me, help plan my life, and understand me better over time."
                    .into(),
            ],
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_secs: 300,
            hour: 20,
            query: "erhu practice today".into(),
            keyword: "erhu".into(),
            title: "reminder".into(),
            message: "haven't practiced erhu today?".into(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_secs: 60,
            query: "today".into(),
            limit: 20,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "Alter".into(),
            timeout_secs: 10,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            static_dir: ".".into(),
            claude_model: "claude-sonnet-4-20250514".into(),
            openai_model: "gpt-4o-mini".into(),
            transcription_model: "whisper-1".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            anthropic_base_url: "https://api.anthropic.com/v1".into(),
            timeout_secs: 60,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            openai_api_key: None,
            anthropic_api_key: None,
            transcription_url: None,
            scoring_url: None,
            scoring_api_key: None,
        }
    }
}

impl ScoringConfig {
    /// Read provider credentials and endpoint overrides from the environment.
    ///
    /// `TOEFL_SCORING_API_KEY` falls back to the OpenAI key, then the Anthropic key.
    pub fn apply_env(&mut self) {
        self.openai_api_key = non_empty_env("OPENAI_API_KEY");
        self.anthropic_api_key = non_empty_env("ANTHROPIC_API_KEY");
        if let Some(model) = non_empty_env("CLAUDE_SCORING_MODEL") {
            self.claude_model = model;
        }
        self.transcription_url = non_empty_env("TOEFL_TRANSCRIPTION_URL");
        self.scoring_url = non_empty_env("TOEFL_SCORING_URL");
        self.scoring_api_key = non_empty_env("TOEFL_SCORING_API_KEY")
            .or_else(|| self.openai_api_key.clone())
            .or_else(|| self.anthropic_api_key.clone());
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Returns `~/.alter/`
pub fn default_alter_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".alter")
}

fn alter_path(name: &str) -> String {
    default_alter_dir().join(name).to_string_lossy().into_owned()
}

/// Returns the default config file path: `~/.alter/config.toml`
pub fn default_config_path() -> PathBuf {
    default_alter_dir().join("config.toml")
}

impl AlterConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            AlterConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (ALTER_LOG_LEVEL, ALTER_MODEL, ALTER_OLLAMA_URL, ALTER_MEMORY_BACKEND, ALTER_DOCS_DIR).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ALTER_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("ALTER_MODEL") {
            self.model.model = val;
        }
        if let Ok(val) = std::env::var("ALTER_OLLAMA_URL") {
            self.model.base_url = val;
        }
        if let Ok(val) = std::env::var("ALTER_MEMORY_BACKEND") {
            self.memory.backend = val;
        }
        if let Ok(val) = std::env::var("ALTER_DOCS_DIR") {
            self.retrieval.docs_dir = val;
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.memory.db_path)
    }

    pub fn resolved_profile_path(&self) -> PathBuf {
        expand_tilde(&self.memory.profile_path)
    }

    pub fn resolved_docs_dir(&self) -> PathBuf {
        expand_tilde(&self.retrieval.docs_dir)
    }

    pub fn resolved_user_config_path(&self) -> PathBuf {
        expand_tilde(&self.user.config_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
