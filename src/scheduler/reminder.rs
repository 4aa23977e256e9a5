use async_trait::async_trait;
use chrono::Timelike;
use std::sync::Arc;

use super::{Clock, DailyLatch, ScheduledTask};
use crate::config::ReminderConfig;
use crate::notify::Notifier;
use crate::profile::{join_texts, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderOutcome {
    TooEarly,
    AlreadySent,
    /// Today's memories already mention the keyword.
    Satisfied,
    Sent,
}

/// Evening reminder, sent at most once per local date.
pub struct ReminderTask {
    config: ReminderConfig,
    user_name: String,
    profile: Profile,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    latch: DailyLatch,
}

impl ReminderTask {
    pub fn new(
        config: ReminderConfig,
        user_name: String,
        profile: Profile,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            user_name,
            profile,
            notifier,
            clock,
            latch: DailyLatch::Idle,
        }
    }

    pub fn latch(&self) -> DailyLatch {
        self.latch
    }

    pub async fn tick(&mut self) -> ReminderOutcome {
        let now = self.clock.now();
        let today = now.date_naive();
        self.latch.roll(today);

        if now.hour() < self.config.hour {
            return ReminderOutcome::TooEarly;
        }
        if self.latch.is_triggered(today) {
            return ReminderOutcome::AlreadySent;
        }

        let recent = self.profile.search(&self.config.query, 5).await;
        let text = join_texts(&recent).to_lowercase();
        if text.contains(&self.config.keyword.to_lowercase()) {
            tracing::debug!(keyword = %self.config.keyword, "reminder not needed");
            return ReminderOutcome::Satisfied;
        }

        let message = format!("{}, {}", self.user_name, self.config.message);
        self.notifier.notify(&self.config.title, &message).await;
        self.latch.trigger(today);
        tracing::info!(%today, "reminder sent");
        ReminderOutcome::Sent
    }
}

#[async_trait]
impl ScheduledTask for ReminderTask {
    fn name(&self) -> &'static str {
        "reminder"
    }

    async fn poll(&mut self) {
        self.tick().await;
    }
}
