use async_trait::async_trait;
use chrono::{NaiveDate, Timelike};
use std::sync::Arc;

use super::{Clock, DailyLatch, ScheduledTask};
use crate::config::SummaryConfig;
use crate::model::{ChatMessage, ChatOptions, ModelProvider};
use crate::profile::{join_texts, Profile, ProfileEntry, Role, DAILY_SUMMARY_TAG};

const SUMMARY_PROMPT: &str = "You keep a private journal for me. Compress the notes below \
into a short summary of the day: what I did, how I felt, and anything I should follow up on. \
Write at most 100 words and do not invent details.";

/// How many of the newest entries are checked for a summary already written today.
const STORED_SUMMARY_SCAN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    OutsideWindow,
    AlreadyDone,
    /// Nothing to summarise; the day is marked done.
    Empty,
    Written,
    /// Model or store failure; retried on the next poll inside the window.
    Failed,
}

/// Writes one `system-summary` entry per local date, between 01:00 and 01:05.
pub struct SummaryTask {
    config: SummaryConfig,
    profile: Profile,
    model: Arc<dyn ModelProvider>,
    options: ChatOptions,
    clock: Arc<dyn Clock>,
    latch: DailyLatch,
}

impl SummaryTask {
    pub fn new(
        config: SummaryConfig,
        profile: Profile,
        model: Arc<dyn ModelProvider>,
        options: ChatOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            profile,
            model,
            options,
            clock,
            latch: DailyLatch::Idle,
        }
    }

    pub fn latch(&self) -> DailyLatch {
        self.latch
    }

    pub async fn tick(&mut self) -> SummaryOutcome {
        let now = self.clock.now();
        let today = now.date_naive();
        self.latch.roll(today);

        if !(now.hour() == 1 && now.minute() < 5) {
            return SummaryOutcome::OutsideWindow;
        }
        if self.latch.is_triggered(today) {
            return SummaryOutcome::AlreadyDone;
        }
        // the latch does not survive a restart; the store does
        if self.stored_today(today).await {
            tracing::info!(%today, "daily summary already stored");
            self.latch.trigger(today);
            return SummaryOutcome::AlreadyDone;
        }

        let entries = self.profile.search(&self.config.query, self.config.limit).await;
        if entries.is_empty() {
            tracing::info!(%today, "no memories to summarise");
            self.latch.trigger(today);
            return SummaryOutcome::Empty;
        }

        let messages = [
            ChatMessage::system(SUMMARY_PROMPT),
            ChatMessage::user(join_texts(&entries)),
        ];
        let summary = match self.model.chat(&messages, &self.options).await {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            Ok(_) => {
                tracing::warn!("model returned an empty summary");
                return SummaryOutcome::Failed;
            }
            Err(e) => {
                tracing::warn!(error = %e, "daily summary generation failed");
                return SummaryOutcome::Failed;
            }
        };

        let entry = ProfileEntry::at(Role::SystemSummary, summary, now).with_tag(DAILY_SUMMARY_TAG);
        if self.profile.append(&entry).await.is_err() {
            return SummaryOutcome::Failed;
        }

        self.latch.trigger(today);
        tracing::info!(%today, entries = entries.len(), "daily summary written");
        SummaryOutcome::Written
    }

    async fn stored_today(&self, today: NaiveDate) -> bool {
        self.profile
            .recent(STORED_SUMMARY_SCAN)
            .await
            .iter()
            .any(|e| e.has_tag(DAILY_SUMMARY_TAG) && e.timestamp.date_naive() == today)
    }
}

#[async_trait]
impl ScheduledTask for SummaryTask {
    fn name(&self) -> &'static str {
        "summary"
    }

    async fn poll(&mut self) {
        self.tick().await;
    }
}
