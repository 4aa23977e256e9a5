//! Background tasks that wake on a fixed interval and act at most once per day.
//!
//! - [`reminder::ReminderTask`]: evening nudge when today's memories never
//!   mention the practice keyword.
//! - [`summary::SummaryTask`]: shortly after 01:00, compresses the day's
//!   memories into one `system-summary` entry.
//!
//! Each task owns a [`DailyLatch`] and reads time through a [`Clock`], so a
//! test can drive ticks deterministically. Loops end when their
//! [`CancellationToken`] is cancelled.

pub mod reminder;
pub mod summary;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

pub use reminder::{ReminderOutcome, ReminderTask};
pub use summary::{SummaryOutcome, SummaryTask};

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Once-per-day guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DailyLatch {
    #[default]
    Idle,
    Triggered(NaiveDate),
}

impl DailyLatch {
    /// Reset when `today` is a different date from the one that triggered.
    pub fn roll(&mut self, today: NaiveDate) {
        if let Self::Triggered(day) = *self {
            if day != today {
                tracing::debug!(%day, %today, "daily latch reset");
                *self = Self::Idle;
            }
        }
    }

    pub fn is_triggered(&self, today: NaiveDate) -> bool {
        matches!(self, Self::Triggered(day) if *day == today)
    }

    pub fn trigger(&mut self, today: NaiveDate) {
        *self = Self::Triggered(today);
    }
}

/// A task the scheduler polls.
#[async_trait]
pub trait ScheduledTask: Send + 'static {
    fn name(&self) -> &'static str;

    async fn poll(&mut self);
}

/// Poll `task` every `period` until `token` is cancelled. The first poll is immediate.
pub async fn run_periodic<T: ScheduledTask>(mut task: T, period: Duration, token: CancellationToken) {
    let name = task.name();
    tracing::info!(task = name, period_secs = period.as_secs(), "scheduler task started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => task.poll().await,
        }
    }

    tracing::info!(task = name, "scheduler task stopped");
}

/// Spawn every enabled task against the shared context.
pub fn spawn_all(ctx: &AppContext, token: &CancellationToken) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if ctx.config.reminder.enabled {
        let task = ReminderTask::new(
            ctx.config.reminder.clone(),
            ctx.user.name.clone(),
            ctx.profile.clone(),
            Arc::clone(&ctx.notifier),
            Arc::clone(&ctx.clock),
        );
        let period = Duration::from_secs(ctx.config.reminder.poll_secs.max(1));
        handles.push(tokio::spawn(run_periodic(task, period, token.child_token())));
    }

    if ctx.config.summary.enabled {
        let task = SummaryTask::new(
            ctx.config.summary.clone(),
            ctx.profile.clone(),
            Arc::clone(&ctx.model),
            ctx.options,
            Arc::clone(&ctx.clock),
        );
        let period = Duration::from_secs(ctx.config.summary.poll_secs.max(1));
        handles.push(tokio::spawn(run_periodic(task, period, token.child_token())));
    }

    handles
}
