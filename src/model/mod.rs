//! Chat-completion access to the local model-serving daemon.
//!
//! Provides the [`ModelProvider`] trait and an Ollama implementation. The
//! provider is created via [`create_provider`] from configuration.

pub mod ollama;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role tag on a chat message sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Decoding parameters forwarded verbatim to the model service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
    pub num_ctx: u32,
    pub top_p: f32,
}

impl From<&crate::config::ModelConfig> for ChatOptions {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            num_ctx: config.num_ctx,
            top_p: config.top_p,
        }
    }
}

/// A request/response chat model.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate the assistant reply for an ordered, role-tagged message list.
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String>;

    /// Model identifier, for logs and diagnostics.
    fn model_name(&self) -> &str;
}

/// Create a model provider from config.
///
/// Currently only `"ollama"` is supported.
pub fn create_provider(
    config: &crate::config::ModelConfig,
) -> Result<Box<dyn ModelProvider>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(config)?)),
        other => anyhow::bail!("unknown model provider: {other}. Supported: ollama"),
    }
}
