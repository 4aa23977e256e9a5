//! Per-user identity: a small `{name, bio}` JSON record.
//!
//! Loaded once at startup. When the file is missing it is created from answers
//! to interactive prompts. The name doubles as the memory-service user id.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifier used when the stored or entered name is blank.
pub const DEFAULT_USER_NAME: &str = "user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_USER_NAME.into(),
            bio: String::new(),
        }
    }
}

impl UserProfile {
    /// Load the user config, creating it via `prompt` if the file does not exist.
    ///
    /// `prompt` receives a question and returns the answer.
    pub fn load_or_create<F>(path: &Path, mut prompt: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<String>,
    {
        if path.exists() {
            return Self::load(path);
        }

        let name = prompt("What should I call you?")?;
        let bio = prompt("Tell me a little about yourself:")?;
        let profile = Self {
            name: name.trim().to_string(),
            bio: bio.trim().to_string(),
        }
        .normalized();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&profile)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write user config {}", path.display()))?;
        tracing::info!(path = %path.display(), user = %profile.name, "user config created");

        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read user config {}", path.display()))?;
        let profile: UserProfile =
            serde_json::from_str(&contents).context("failed to parse user config JSON")?;
        Ok(profile.normalized())
    }

    /// The identifier is never empty.
    fn normalized(mut self) -> Self {
        if self.name.trim().is_empty() {
            self.name = DEFAULT_USER_NAME.into();
        }
        self
    }
}
