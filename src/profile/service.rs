//! Remote memory-service backend (mem0-compatible REST API).
//!
//! The service answers searches with either a bare JSON list or an object
//! wrapping the list under `results`. [`SearchResponse`] absorbs that ambiguity
//! here so nothing else has to care.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ProfileEntry, ProfileStore, Role};
use crate::config::MemoryConfig;

/// Shape of a memory-service search or listing response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Wrapped { results: Vec<Value> },
    Bare(Vec<Value>),
    Other(Value),
}

impl SearchResponse {
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::Wrapped { results } => results,
            Self::Bare(items) => items,
            Self::Other(other) => {
                tracing::debug!(shape = %other, "unexpected memory-service response shape");
                Vec::new()
            }
        }
    }
}

/// Display text for a raw memory item: `memory`, then `text`, then the raw value.
pub fn display_text(item: &Value) -> String {
    match item {
        Value::Object(map) => ["memory", "text"]
            .iter()
            .filter_map(|key| map.get(*key))
            .filter_map(Value::as_str)
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| item.to_string()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert one raw service item into a [`ProfileEntry`], tolerating missing fields.
pub fn entry_from_item(item: &Value) -> ProfileEntry {
    let metadata = item.get("metadata");
    let lookup = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .or_else(|| item.get(key))
            .and_then(Value::as_str)
    };

    let role = lookup("role")
        .and_then(|r| r.parse::<Role>().ok())
        .unwrap_or(Role::User);
    let timestamp = lookup("timestamp")
        .or_else(|| lookup("created_at"))
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Local))
        .unwrap_or_else(|| DateTime::<Local>::from(std::time::UNIX_EPOCH));

    let mut entry = ProfileEntry::at(role, display_text(item), timestamp);
    if let Some(id) = item.get("id").and_then(Value::as_str) {
        entry.id = id.to_string();
    }
    if let Some(tags) = metadata
        .and_then(|m| m.get("tags"))
        .and_then(Value::as_array)
    {
        entry.tags = tags
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    entry
}

pub struct RemoteMemoryStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    user_id: String,
}

impl RemoteMemoryStore {
    pub fn new(config: &MemoryConfig, user_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create memory-service HTTP client")?;
        Ok(Self {
            client,
            base_url: config.service_url.trim_end_matches('/').to_string(),
            api_key: config.service_api_key.clone(),
            user_id: user_id.to_string(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.post(format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn decode(response: reqwest::Response) -> Result<Vec<ProfileEntry>> {
        let status = response.status();
        anyhow::ensure!(status.is_success(), "memory service returned HTTP {status}");
        let body: SearchResponse = response
            .json()
            .await
            .context("failed to parse memory-service response")?;
        Ok(body.into_items().iter().map(entry_from_item).collect())
    }
}

#[async_trait]
impl ProfileStore for RemoteMemoryStore {
    async fn append(&self, entry: &ProfileEntry) -> Result<()> {
        let body = json!({
            "messages": [{"role": "user", "content": entry.text}],
            "user_id": self.user_id,
            "metadata": {
                "timestamp": entry.timestamp.to_rfc3339(),
                "role": entry.role.as_str(),
                "tags": entry.tags,
            },
        });
        let response = self
            .post("/memories")
            .json(&body)
            .send()
            .await
            .context("memory-service add request failed")?;
        let status = response.status();
        anyhow::ensure!(status.is_success(), "memory service returned HTTP {status}");
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProfileEntry>> {
        let body = json!({"query": query, "user_id": self.user_id, "limit": limit});
        let response = self
            .post("/search")
            .json(&body)
            .send()
            .await
            .context("memory-service search request failed")?;
        let mut entries = Self::decode(response).await?;
        entries.truncate(limit);
        Ok(entries)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ProfileEntry>> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/memories", self.base_url),
            &[("user_id", self.user_id.as_str())],
        )
        .context("invalid memory-service URL")?;
        let mut req = self.client.get(url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.context("memory-service list request failed")?;
        let mut entries = Self::decode(response).await?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    fn backend(&self) -> &'static str {
        "service"
    }
}
