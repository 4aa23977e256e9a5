//! Flat-file profile backend.
//!
//! One entry per line: `[<rfc3339>] <role> #tag: <text>`. Lines that do not
//! follow the format (hand-written profile notes) are kept as user entries.
//! Chat turns are stored as a short preview of each side.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{ProfileEntry, ProfileStore, Role, CHAT_TURN_TAG};
use crate::text::{query_terms, truncate_chars};

const TURN_PREVIEW_CHARS: usize = 50;

pub struct FileProfileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Every entry in file order (oldest first). A missing file is empty.
    async fn read_all(&self) -> Result<Vec<ProfileEntry>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read profile file {}", self.path.display())
                })
            }
        };

        Ok(contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| parse_line(n, line))
            .collect())
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn append(&self, entry: &ProfileEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open profile file {}", self.path.display()))?;

        file.write_all(format_line(entry).as_bytes())
            .await
            .context("failed to append profile entry")?;
        file.flush().await?;
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProfileEntry>> {
        let entries = self.read_all().await?;
        let terms = query_terms(query);

        // (score, position) so ties prefer newer lines.
        let mut scored: Vec<(usize, usize)> = entries
            .iter()
            .enumerate()
            .map(|(pos, e)| {
                let haystack = e.text.to_lowercase();
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score, pos)
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, pos)| entries[pos].clone())
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ProfileEntry>> {
        let mut entries = self.read_all().await?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

fn format_line(entry: &ProfileEntry) -> String {
    let mut header = entry.role.as_str().to_string();
    for tag in &entry.tags {
        header.push_str(" #");
        header.push_str(tag);
    }
    format!("[{}] {}: {}\n", entry.timestamp.to_rfc3339(), header, stored_text(entry))
}

fn stored_text(entry: &ProfileEntry) -> String {
    let turn = entry
        .has_tag(CHAT_TURN_TAG)
        .then(|| entry.text.strip_prefix("user: ")?.split_once("\nai: "))
        .flatten();
    let text = match turn {
        Some((message, reply)) => format!(
            "user: {} ai: {}",
            truncate_chars(message, TURN_PREVIEW_CHARS),
            truncate_chars(reply, TURN_PREVIEW_CHARS)
        ),
        None => entry.text.clone(),
    };
    text.replace(['\r', '\n'], " ")
}

fn parse_line(line_no: usize, line: &str) -> ProfileEntry {
    parse_structured(line).unwrap_or_else(|| ProfileEntry {
        id: format!("line-{line_no}"),
        role: Role::User,
        text: line.trim().to_string(),
        timestamp: DateTime::<Local>::from(std::time::UNIX_EPOCH),
        tags: Vec::new(),
    })
}

fn parse_structured(line: &str) -> Option<ProfileEntry> {
    let rest = line.strip_prefix('[')?;
    let (stamp, rest) = rest.split_once("] ")?;
    let timestamp = DateTime::parse_from_rfc3339(stamp).ok()?.with_timezone(&Local);
    let (header, text) = rest.split_once(": ")?;

    let mut parts = header.split_whitespace();
    let role: Role = parts.next()?.parse().ok()?;
    let tags = parts
        .filter_map(|p| p.strip_prefix('#'))
        .map(str::to_string)
        .collect();

    let mut entry = ProfileEntry::at(role, text, timestamp);
    entry.tags = tags;
    Some(entry)
}
