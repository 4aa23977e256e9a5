//! Durable per-user memory.
//!
//! [`ProfileStore`] is the backend seam: a flat text file ([`file`]), a local
//! SQLite database with FTS5 ranking ([`sqlite`]), or a remote mem0-style memory
//! service ([`service`]). Callers go through [`Profile`], which turns every
//! search failure into an empty result and runs chat-path appends detached.

pub mod file;
pub mod service;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tag carried by the once-a-day summary entry.
pub const DAILY_SUMMARY_TAG: &str = "daily_summary";
/// Tag carried by persisted chat turns.
pub const CHAT_TURN_TAG: &str = "chat_turn";

/// Who authored an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Assistant,
    SystemSummary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::SystemSummary => "system-summary",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system-summary" => Ok(Self::SystemSummary),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// One remembered record. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Local>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ProfileEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self::at(role, text, Local::now())
    }

    pub fn at(role: Role, text: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            role,
            text: text.into(),
            timestamp,
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Join the display text of several entries, one per line.
pub fn join_texts(entries: &[ProfileEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Storage backend for profile entries.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Persist one entry.
    async fn append(&self, entry: &ProfileEntry) -> Result<()>;

    /// Up to `limit` entries ranked by the backend's own relevance criteria.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProfileEntry>>;

    /// Up to `limit` entries, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ProfileEntry>>;

    /// Short backend name for logs and diagnostics.
    fn backend(&self) -> &'static str;
}

/// Create a profile store from config.
///
/// Supported backends: `"sqlite"` (default), `"file"` and `"service"`.
pub fn create_store(
    config: &crate::config::AlterConfig,
    user_id: &str,
) -> Result<Arc<dyn ProfileStore>> {
    match config.memory.backend.as_str() {
        "sqlite" => {
            let conn = crate::db::open_database(config.resolved_db_path())?;
            Ok(Arc::new(sqlite::SqliteProfileStore::new(conn, user_id)))
        }
        "file" => Ok(Arc::new(file::FileProfileStore::new(
            config.resolved_profile_path(),
        ))),
        "service" => Ok(Arc::new(service::RemoteMemoryStore::new(
            &config.memory,
            user_id,
        )?)),
        other => anyhow::bail!("unknown memory backend: {other}. Supported: sqlite, file, service"),
    }
}

/// Error-absorbing facade over a [`ProfileStore`].
#[derive(Clone)]
pub struct Profile {
    store: Arc<dyn ProfileStore>,
}

impl Profile {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Append and report failure; used where the caller can wait.
    pub async fn append(&self, entry: &ProfileEntry) -> Result<()> {
        self.store.append(entry).await.inspect_err(|e| {
            tracing::warn!(backend = self.store.backend(), error = %e, "profile append failed");
        })
    }

    /// Append off the caller's path. Failures are logged, never returned.
    pub fn append_detached(&self, entry: ProfileEntry) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.append(&entry).await {
                Ok(()) => tracing::debug!(id = %entry.id, "profile entry stored"),
                Err(e) => tracing::warn!(
                    backend = store.backend(),
                    id = %entry.id,
                    error = %e,
                    "detached profile append failed"
                ),
            }
        })
    }

    /// Search that never fails: backend errors become an empty result.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<ProfileEntry> {
        match self.store.search(query, limit).await {
            Ok(mut entries) => {
                entries.truncate(limit);
                entries
            }
            Err(e) => {
                tracing::warn!(backend = self.store.backend(), error = %e, "profile search failed");
                Vec::new()
            }
        }
    }

    pub async fn recent(&self, limit: usize) -> Vec<ProfileEntry> {
        match self.store.recent(limit).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(backend = self.store.backend(), error = %e, "profile listing failed");
                Vec::new()
            }
        }
    }
}
