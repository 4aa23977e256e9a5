#![allow(dead_code)]

use alter::model::{ChatMessage, ChatOptions, ModelProvider};
use alter::notify::Notifier;
use alter::profile::{ProfileEntry, ProfileStore};
use alter::scheduler::Clock;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use rusqlite::Connection;
use std::sync::Mutex;

/// Open a fresh in-memory database with the schema applied.
pub fn test_db() -> Connection {
    alter::db::open_memory_database().unwrap()
}

/// Local time on 2026-03-`day` at `hour:minute`.
pub fn local(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 3, day, hour, minute, 0)
        .single()
        .unwrap()
}

/// Model that records every request and answers with a fixed reply.
pub struct MockModel {
    reply: Result<String, String>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            reply: Err(error.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Vec<ChatMessage> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ModelProvider for MockModel {
    async fn chat(&self, messages: &[ChatMessage], _options: &ChatOptions) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.reply.clone().map_err(anyhow::Error::msg)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// In-memory store; search returns entries whose text contains any query term.
#[derive(Default)]
pub struct MemoryStore {
    pub entries: Mutex<Vec<ProfileEntry>>,
    pub fail_appends: bool,
}

impl MemoryStore {
    pub fn with_entries(texts: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut entries = store.entries.lock().unwrap();
            for text in texts {
                entries.push(ProfileEntry::new(alter::profile::Role::User, *text));
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().map(|e| e.text.clone()).collect()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn append(&self, entry: &ProfileEntry) -> Result<()> {
        if self.fail_appends {
            anyhow::bail!("store offline");
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProfileEntry>> {
        let terms = alter::text::query_terms(query);
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| {
                let text = e.text.to_lowercase();
                terms.iter().any(|t| text.contains(t.as_str()))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ProfileEntry>> {
        Ok(self.entries.lock().unwrap().iter().rev().take(limit).cloned().collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Notifier that remembers what it was asked to show.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

/// Clock pinned to a settable instant.
pub struct FixedClock(Mutex<DateTime<Local>>);

impl FixedClock {
    pub fn at(now: DateTime<Local>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.0.lock().unwrap()
    }
}
