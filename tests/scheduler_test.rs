mod helpers;

use alter::config::{ModelConfig, ReminderConfig, SummaryConfig};
use alter::model::{ChatOptions, MessageRole};
use alter::profile::{Profile, ProfileEntry, Role, DAILY_SUMMARY_TAG};
use alter::scheduler::{
    DailyLatch, ReminderOutcome, ReminderTask, SummaryOutcome, SummaryTask,
};
use helpers::{local, FixedClock, MemoryStore, MockModel, RecordingNotifier};
use std::sync::Arc;

struct ReminderRig {
    task: ReminderTask,
    clock: Arc<FixedClock>,
    notifier: Arc<RecordingNotifier>,
    store: Arc<MemoryStore>,
}

fn reminder_rig(store: MemoryStore, start: chrono::DateTime<chrono::Local>) -> ReminderRig {
    let clock = Arc::new(FixedClock::at(start));
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(store);
    let task = ReminderTask::new(
        ReminderConfig::default(),
        "Bingxi".into(),
        Profile::new(store.clone()),
        notifier.clone(),
        clock.clone(),
    );
    ReminderRig {
        task,
        clock,
        notifier,
        store,
    }
}

#[tokio::test]
async fn reminder_waits_for_the_evening() {
    let mut rig = reminder_rig(MemoryStore::default(), local(2, 19, 59));
    assert_eq!(rig.task.tick().await, ReminderOutcome::TooEarly);
    assert_eq!(rig.notifier.count(), 0);
}

#[tokio::test]
async fn reminder_fires_once_per_day_and_again_after_midnight() {
    let mut rig = reminder_rig(MemoryStore::default(), local(2, 20, 0));

    assert_eq!(rig.task.tick().await, ReminderOutcome::Sent);
    rig.clock.set(local(2, 20, 5));
    assert_eq!(rig.task.tick().await, ReminderOutcome::AlreadySent);
    rig.clock.set(local(2, 23, 55));
    assert_eq!(rig.task.tick().await, ReminderOutcome::AlreadySent);
    assert_eq!(rig.notifier.count(), 1);

    // next day, before the hour: latch resets but nothing fires
    rig.clock.set(local(3, 0, 0));
    assert_eq!(rig.task.tick().await, ReminderOutcome::TooEarly);
    assert_eq!(rig.task.latch(), DailyLatch::Idle);

    rig.clock.set(local(3, 21, 0));
    assert_eq!(rig.task.tick().await, ReminderOutcome::Sent);
    assert_eq!(rig.notifier.count(), 2);

    let sent = rig.notifier.sent.lock().unwrap();
    assert_eq!(sent[0].0, "reminder");
    assert_eq!(sent[0].1, "Bingxi, haven't practiced erhu today?");
}

#[tokio::test]
async fn keyword_in_memory_suppresses_without_latching() {
    let mut rig = reminder_rig(
        MemoryStore::with_entries(&["Practiced ERHU for an hour today"]),
        local(2, 20, 30),
    );

    assert_eq!(rig.task.tick().await, ReminderOutcome::Satisfied);
    assert_eq!(rig.task.latch(), DailyLatch::Idle);
    assert_eq!(rig.notifier.count(), 0);

    // memory no longer mentions it on a later poll: the reminder still goes out
    rig.store.entries.lock().unwrap().clear();
    rig.clock.set(local(2, 20, 35));
    assert_eq!(rig.task.tick().await, ReminderOutcome::Sent);
    assert_eq!(rig.notifier.count(), 1);
}

struct SummaryRig {
    task: SummaryTask,
    clock: Arc<FixedClock>,
    model: Arc<MockModel>,
    store: Arc<MemoryStore>,
}

fn summary_rig(store: MemoryStore, model: MockModel, start: chrono::DateTime<chrono::Local>) -> SummaryRig {
    let clock = Arc::new(FixedClock::at(start));
    let model = Arc::new(model);
    let store = Arc::new(store);
    let task = SummaryTask::new(
        SummaryConfig::default(),
        Profile::new(store.clone()),
        model.clone(),
        ChatOptions::from(&ModelConfig::default()),
        clock.clone(),
    );
    SummaryRig {
        task,
        clock,
        model,
        store,
    }
}

#[tokio::test]
async fn summary_only_runs_in_the_window() {
    let mut rig = summary_rig(
        MemoryStore::with_entries(&["what did I do today"]),
        MockModel::replying("A quiet day."),
        local(2, 0, 59),
    );
    assert_eq!(rig.task.tick().await, SummaryOutcome::OutsideWindow);
    rig.clock.set(local(2, 1, 5));
    assert_eq!(rig.task.tick().await, SummaryOutcome::OutsideWindow);
    rig.clock.set(local(2, 13, 2));
    assert_eq!(rig.task.tick().await, SummaryOutcome::OutsideWindow);
    assert_eq!(rig.model.call_count(), 0);
}

#[tokio::test]
async fn summary_written_at_most_once_per_date() {
    let mut rig = summary_rig(
        MemoryStore::with_entries(&["today: erhu practice", "today: read Zhuangzi"]),
        MockModel::replying("  Practiced erhu and read Zhuangzi.  "),
        local(2, 1, 0),
    );

    assert_eq!(rig.task.tick().await, SummaryOutcome::Written);
    for minute in 1..5 {
        rig.clock.set(local(2, 1, minute));
        assert_eq!(rig.task.tick().await, SummaryOutcome::AlreadyDone);
    }
    assert_eq!(rig.model.call_count(), 1);

    let summaries: Vec<ProfileEntry> = rig
        .store
        .entries
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.has_tag(DAILY_SUMMARY_TAG))
        .cloned()
        .collect();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].role, Role::SystemSummary);
    assert_eq!(summaries[0].text, "Practiced erhu and read Zhuangzi.");
    assert_eq!(summaries[0].timestamp, local(2, 1, 0));

    let call = rig.model.last_call();
    assert_eq!(call[0].role, MessageRole::System);
    assert!(call[1].content.contains("today: read Zhuangzi"));

    // the following night summarises again
    rig.clock.set(local(3, 1, 2));
    assert_eq!(rig.task.tick().await, SummaryOutcome::Written);
    assert_eq!(rig.model.call_count(), 2);
}

#[tokio::test]
async fn empty_day_latches_without_writing() {
    let mut rig = summary_rig(MemoryStore::default(), MockModel::replying("unused"), local(2, 1, 1));

    assert_eq!(rig.task.tick().await, SummaryOutcome::Empty);
    assert_eq!(rig.task.latch(), DailyLatch::Triggered(local(2, 1, 1).date_naive()));
    rig.clock.set(local(2, 1, 3));
    assert_eq!(rig.task.tick().await, SummaryOutcome::AlreadyDone);
    assert_eq!(rig.store.len(), 0);
    assert_eq!(rig.model.call_count(), 0);
}

#[tokio::test]
async fn model_failure_retries_inside_the_window() {
    let mut rig = summary_rig(
        MemoryStore::with_entries(&["today was long"]),
        MockModel::failing("model not loaded"),
        local(2, 1, 0),
    );

    assert_eq!(rig.task.tick().await, SummaryOutcome::Failed);
    assert_eq!(rig.task.latch(), DailyLatch::Idle);
    rig.clock.set(local(2, 1, 1));
    assert_eq!(rig.task.tick().await, SummaryOutcome::Failed);
    assert_eq!(rig.model.call_count(), 2);
    assert_eq!(rig.store.len(), 1);
}

#[tokio::test]
async fn restarted_task_finds_the_stored_summary() {
    let store = MemoryStore::with_entries(&["today: erhu practice"]);
    let mut first = summary_rig(store, MockModel::replying("Practiced erhu."), local(2, 1, 0));
    assert_eq!(first.task.tick().await, SummaryOutcome::Written);

    // a fresh task over the same store, as after a process restart
    let model = Arc::new(MockModel::replying("Practiced erhu again."));
    let clock = Arc::new(FixedClock::at(local(2, 1, 2)));
    let mut restarted = SummaryTask::new(
        SummaryConfig::default(),
        Profile::new(first.store.clone()),
        model.clone(),
        ChatOptions::from(&ModelConfig::default()),
        clock.clone(),
    );

    assert_eq!(restarted.tick().await, SummaryOutcome::AlreadyDone);
    assert_eq!(restarted.latch(), DailyLatch::Triggered(local(2, 1, 2).date_naive()));
    assert_eq!(model.call_count(), 0);

    // yesterday's summary does not block tonight's
    clock.set(local(3, 1, 0));
    assert_eq!(restarted.tick().await, SummaryOutcome::Written);
    assert_eq!(model.call_count(), 1);
    let summaries = first
        .store
        .entries
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.has_tag(DAILY_SUMMARY_TAG))
        .count();
    assert_eq!(summaries, 2);
}
