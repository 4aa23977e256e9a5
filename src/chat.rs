//! The chat turn pipeline.
//!
//! One turn: recall relevant profile entries (or fall back to the default
//! persona), pull document context, compose the system prompt, replay the
//! recent history, call the model, and return the reply. The turn is written
//! back to the profile store on a detached task. Failures never escape as
//! errors; the caller always gets some text back.

use std::sync::Arc;

use crate::config::ChatConfig;
use crate::model::{ChatMessage, ChatOptions, ModelProvider};
use crate::profile::{join_texts, Profile, ProfileEntry, Role, CHAT_TURN_TAG};
use crate::retrieval::RetrievalAugmenter;
use crate::user::UserProfile;

/// A (user, assistant) exchange from the caller's rolling history.
pub type Turn = (String, String);

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0:#}")]
    Model(#[from] anyhow::Error),
}

/// Result of one pipeline turn.
pub struct TurnOutcome {
    pub reply: String,
    /// Handle of the detached profile append; `None` when the turn failed.
    pub persisted: Option<tokio::task::JoinHandle<()>>,
}

pub struct ChatPipeline {
    model: Arc<dyn ModelProvider>,
    options: ChatOptions,
    profile: Profile,
    retrieval: Option<Arc<RetrievalAugmenter>>,
    user: UserProfile,
    config: ChatConfig,
}

impl ChatPipeline {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        options: ChatOptions,
        profile: Profile,
        retrieval: Option<Arc<RetrievalAugmenter>>,
        user: UserProfile,
        config: ChatConfig,
    ) -> Self {
        Self {
            model,
            options,
            profile,
            retrieval,
            user,
            config,
        }
    }

    /// Reply to `message`. Never fails; errors come back as `"error: ..."`.
    pub async fn respond(&self, message: &str, history: &[Turn]) -> String {
        self.turn(message, history).await.reply
    }

    /// Like [`respond`](Self::respond), also handing back the persistence task.
    pub async fn turn(&self, message: &str, history: &[Turn]) -> TurnOutcome {
        match self.generate(message, history).await {
            Ok(reply) => {
                let entry = ProfileEntry::new(Role::User, format!("user: {message}\nai: {reply}"))
                    .with_tag(CHAT_TURN_TAG);
                let handle = self.profile.append_detached(entry);
                TurnOutcome {
                    reply,
                    persisted: Some(handle),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "chat turn failed");
                TurnOutcome {
                    reply: format!("error: {e}"),
                    persisted: None,
                }
            }
        }
    }

    async fn generate(&self, message: &str, history: &[Turn]) -> Result<String, ChatError> {
        let memories = self.profile.search(message, self.config.profile_limit).await;
        let profile_text = if memories.is_empty() {
            self.default_persona()
        } else {
            join_texts(&memories)
        };

        let rag_context = match &self.retrieval {
            Some(rag) => rag.query(message).await,
            None => String::new(),
        };

        let system = self.system_prompt(&profile_text, &rag_context);
        let messages = build_messages(system, history, message, self.config.history_turns);
        tracing::debug!(
            memories = memories.len(),
            rag = !rag_context.is_empty(),
            messages = messages.len(),
            "sending chat turn"
        );

        let reply = self.model.chat(&messages, &self.options).await?;
        Ok(reply)
    }

    pub fn default_persona(&self) -> String {
        self.config
            .default_persona
            .replace("{name}", &self.user.name)
            .replace("{bio}", &self.user.bio)
            .trim()
            .to_string()
    }

    pub fn system_prompt(&self, profile_text: &str, rag_context: &str) -> String {
        let mut prompt = format!(
            "You are my ({name}) personal AI alter ego.\n\
             Long-term memory:\n{profile_text}\n\n\
             Document knowledge (if relevant):\n{rag_context}\n\n\
             Rules:",
            name = self.user.name,
        );
        for rule in &self.config.rules {
            prompt.push_str("\n- ");
            prompt.push_str(rule);
        }
        if !self.user.bio.trim().is_empty() {
            prompt.push_str("\n- Identity: ");
            prompt.push_str(self.user.bio.trim());
        }
        prompt
    }
}

/// System message, then the last `max_turns` history pairs, then the new message.
pub fn build_messages(
    system: String,
    history: &[Turn],
    message: &str,
    max_turns: usize,
) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(max_turns);
    let recent = &history[start..];

    let mut messages = Vec::with_capacity(recent.len() * 2 + 2);
    messages.push(ChatMessage::system(system));
    for (user, assistant) in recent {
        messages.push(ChatMessage::user(user.as_str()));
        messages.push(ChatMessage::assistant(assistant.as_str()));
    }
    messages.push(ChatMessage::user(message));
    messages
}
