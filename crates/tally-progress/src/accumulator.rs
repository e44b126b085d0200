//! The task progress accumulator.
//!
//! Consumes the stream of per-record [`Notification`]s, maintains per-task
//! counters, and decides when and how to transition task state:
//!
//! - the first live notification for a queued task marks it ACTIVE;
//! - each notification increments the matching store counter atomically;
//! - the notification flagged as carrying the last expected record (or the
//!   counters reaching the expected total) triggers the terminal transition:
//!   FINISHED if no record errored, FINISHED_WITH_ERRORS otherwise.
//!
//! ## Counter cache
//!
//! Counters are cached in memory per task and recovered from the store on a
//! cache miss, so a restarted accumulator resumes exactly where the last
//! persisted increment left off. Entries are evicted when a task finalizes
//! and, under memory pressure, least-recently-touched first.
//!
//! ## Failure semantics
//!
//! Every store write goes through the bounded fixed-backoff retry helper.
//! When the budget is exhausted the error propagates to the drive loop, which
//! logs it and moves on: the task stays in its last successfully persisted
//! state until notifications for it arrive again or an operator intervenes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tally_core::TaskId;

use crate::error::{Error, Result};
use crate::events::{EventSink, TaskEvent, TaskEventData};
use crate::metrics::ProgressMetrics;
use crate::notification::{Notification, RecordOutcome};
use crate::records::ProcessedRecord;
use crate::report::ErrorSample;
use crate::retry::{retry, RetryPolicy};
use crate::store::{ErrorLog, RecordLog, TaskStore};
use crate::task::{ProgressCounts, TaskState};

/// Default capacity of the per-task counter cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Configuration for the accumulator.
#[derive(Debug, Clone, Copy)]
pub struct AccumulatorConfig {
    /// Retry policy applied to every store operation.
    pub retry: RetryPolicy,
    /// Maximum number of live counter cache entries.
    pub cache_capacity: usize,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// What the accumulator did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Counters updated, task still in flight.
    Applied,
    /// Counters updated and the task reached the given terminal state.
    Finalized(TaskState),
    /// The record already had a final outcome; nothing changed.
    DuplicateRecord,
    /// No task row exists for the notification's task id.
    UnknownTask,
    /// The task is (or became) terminal; the notification flowed through
    /// without effect.
    AlreadyTerminal,
    /// The task has not finished enumeration yet; notifications are not
    /// expected before the task is queued.
    NotQueued,
    /// The increment would exceed the expected count; rejected.
    OverflowRejected,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    state: TaskState,
    expected: Option<u64>,
    counts: ProgressCounts,
    touched_at: Instant,
}

/// Accumulates per-record notifications into task-level bookkeeping.
pub struct ProgressAccumulator {
    tasks: Arc<dyn TaskStore>,
    records: Arc<dyn RecordLog>,
    errors: Arc<dyn ErrorLog>,
    config: AccumulatorConfig,
    metrics: ProgressMetrics,
    cache: HashMap<TaskId, CacheEntry>,
}

impl ProgressAccumulator {
    /// Creates an accumulator over the given stores.
    #[must_use]
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        records: Arc<dyn RecordLog>,
        errors: Arc<dyn ErrorLog>,
        config: AccumulatorConfig,
    ) -> Self {
        Self {
            tasks,
            records,
            errors,
            config,
            metrics: ProgressMetrics::new(),
            cache: HashMap::new(),
        }
    }

    /// Returns the number of tasks with live counter cache entries.
    #[must_use]
    pub fn tracked_tasks(&self) -> usize {
        self.cache.len()
    }

    /// Processes one notification.
    ///
    /// Lifecycle events for durable transitions are pushed to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error when a store write fails past the retry budget; the
    /// task is left in its last successfully persisted state.
    #[tracing::instrument(
        skip(self, notification, sink),
        fields(
            task_id = %notification.task_id,
            record = %notification.record,
            outcome = notification.outcome.as_label(),
            is_last = notification.is_last
        )
    )]
    pub async fn handle(
        &mut self,
        notification: &Notification,
        sink: &mut dyn EventSink,
    ) -> Result<Disposition> {
        let task_id = notification.task_id;

        let Some(mut entry) = self.entry(task_id).await? else {
            tracing::warn!(%task_id, "notification for unknown task, dropping");
            self.metrics.record_dropped_event("unknown_task");
            return Ok(Disposition::UnknownTask);
        };

        if entry.state.is_terminal() {
            tracing::debug!(%task_id, state = %entry.state, "notification for terminal task ignored");
            self.metrics.record_dropped_event("terminal_task");
            return Ok(Disposition::AlreadyTerminal);
        }

        if entry.state == TaskState::Pending {
            tracing::warn!(%task_id, "notification before enumeration completed, dropping");
            self.metrics.record_dropped_event("task_not_queued");
            return Ok(Disposition::NotQueued);
        }

        // Replayed deliveries must not count twice.
        let records = Arc::clone(&self.records);
        let record_id = notification.record.as_str();
        let existing = retry(&self.config.retry, "record_lookup", || {
            let records = Arc::clone(&records);
            async move { records.record(task_id, record_id).await }
        })
        .await?;
        if existing.is_some_and(|r| r.is_finished()) {
            tracing::debug!(%task_id, record = %record_id, "record already finished, skipping");
            self.metrics.record_dropped_event("duplicate_record");
            return Ok(Disposition::DuplicateRecord);
        }

        if let Some(expected) = entry.expected {
            if entry.counts.attempted() >= expected {
                tracing::warn!(%task_id, expected, "notification past expected count, dropping");
                self.metrics.record_dropped_event("count_overflow");
                return Ok(Disposition::OverflowRejected);
            }
        }

        if entry.state == TaskState::Queued {
            match self.activate(task_id, sink).await {
                Ok(()) => entry.state = TaskState::Active,
                Err(error) if is_terminal_interrupt(&error) => {
                    return Ok(self.absorb_terminal(task_id));
                }
                Err(error) => return Err(error),
            }
        }

        let record = ProcessedRecord::finished(
            task_id,
            record_id,
            notification.outcome,
            notification.info.clone(),
        );
        let records = Arc::clone(&self.records);
        let record_ref = &record;
        retry(&self.config.retry, "put_record", || {
            let records = Arc::clone(&records);
            async move { records.put_record(record_ref).await }
        })
        .await?;

        let (processed_delta, errored_delta) = match notification.outcome {
            RecordOutcome::Success => (1, 0),
            RecordOutcome::Error => (0, 1),
        };
        let tasks = Arc::clone(&self.tasks);
        let totals = match retry(&self.config.retry, "update_progress", || {
            let tasks = Arc::clone(&tasks);
            async move {
                tasks
                    .update_progress(task_id, processed_delta, errored_delta)
                    .await
            }
        })
        .await
        {
            Ok(totals) => totals,
            Err(error) if is_terminal_interrupt(&error) => {
                return Ok(self.absorb_terminal(task_id));
            }
            Err(error) => return Err(error),
        };
        entry.counts = totals;
        self.metrics.record_notification(notification.outcome.as_label());

        if notification.outcome.is_error() {
            let message = notification
                .info
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            let errors = Arc::clone(&self.errors);
            let message_ref = message.as_str();
            retry(&self.config.retry, "record_error", || {
                let errors = Arc::clone(&errors);
                async move {
                    errors
                        .record_error(task_id, message_ref, ErrorSample::new(record_id, None))
                        .await
                }
            })
            .await?;
        }

        let complete = notification.is_last
            || entry.expected.is_some_and(|expected| totals.attempted() >= expected);
        if complete {
            return self.finalize(task_id, totals, sink).await;
        }

        entry.touched_at = Instant::now();
        self.cache.insert(task_id, entry);
        Ok(Disposition::Applied)
    }

    /// Loads the counter cache entry for a task, recovering from the store on
    /// a miss. Returns `None` for unknown tasks.
    async fn entry(&mut self, task_id: TaskId) -> Result<Option<CacheEntry>> {
        if let Some(entry) = self.cache.get(&task_id) {
            return Ok(Some(*entry));
        }

        let tasks = Arc::clone(&self.tasks);
        let found = retry(&self.config.retry, "find_task", || {
            let tasks = Arc::clone(&tasks);
            async move { tasks.find_task(task_id).await }
        })
        .await?;
        let Some(task) = found else {
            return Ok(None);
        };

        if task.attempted() > 0 {
            tracing::info!(
                %task_id,
                processed = task.processed_count,
                errored = task.errored_count,
                "recovered counters from store"
            );
        }

        let entry = CacheEntry {
            state: task.state,
            expected: task.expected_count,
            counts: task.counts(),
            touched_at: Instant::now(),
        };
        self.insert_entry(task_id, entry);
        Ok(Some(entry))
    }

    fn insert_entry(&mut self, task_id: TaskId, entry: CacheEntry) {
        if self.cache.len() >= self.config.cache_capacity && !self.cache.contains_key(&task_id) {
            // Evict the least recently touched entry.
            let oldest = self
                .cache
                .iter()
                .min_by_key(|(_, e)| e.touched_at)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                self.cache.remove(&oldest);
            }
        }
        self.cache.insert(task_id, entry);
        self.metrics.set_tracked_tasks(self.cache.len());
    }

    async fn activate(&self, task_id: TaskId, sink: &mut dyn EventSink) -> Result<()> {
        let tasks = Arc::clone(&self.tasks);
        retry(&self.config.retry, "update_state", || {
            let tasks = Arc::clone(&tasks);
            async move {
                tasks
                    .update_state(task_id, TaskState::Active, "processing first record")
                    .await
            }
        })
        .await?;
        self.metrics.record_task_transition(
            TaskState::Queued.as_label(),
            TaskState::Active.as_label(),
        );
        sink.push(TaskEvent::new(TaskEventData::TaskStarted { task_id }));
        Ok(())
    }

    async fn finalize(
        &mut self,
        task_id: TaskId,
        totals: ProgressCounts,
        sink: &mut dyn EventSink,
    ) -> Result<Disposition> {
        let terminal = TaskState::terminal_for(totals.errored);
        let description = if totals.errored == 0 {
            "completely processed"
        } else {
            "completed with errors"
        };

        let tasks = Arc::clone(&self.tasks);
        let applied = match retry(&self.config.retry, "finish_task", || {
            let tasks = Arc::clone(&tasks);
            async move {
                tasks
                    .finish_task(task_id, totals.processed, totals.errored, terminal, description)
                    .await
            }
        })
        .await
        {
            Ok(applied) => applied,
            Err(error) if is_terminal_interrupt(&error) => {
                return Ok(self.absorb_terminal(task_id));
            }
            Err(error) => return Err(error),
        };

        if applied {
            tracing::info!(
                %task_id,
                state = %terminal,
                processed = totals.processed,
                errored = totals.errored,
                "task finalized"
            );
            self.metrics
                .record_task_transition(TaskState::Active.as_label(), terminal.as_label());
            let data = if totals.errored == 0 {
                TaskEventData::TaskFinished {
                    task_id,
                    processed_count: totals.processed,
                    errored_count: totals.errored,
                }
            } else {
                TaskEventData::TaskFailed {
                    task_id,
                    processed_count: totals.processed,
                    errored_count: totals.errored,
                }
            };
            sink.push(TaskEvent::new(data));
        }

        self.evict(task_id);
        Ok(Disposition::Finalized(terminal))
    }

    /// A transition raced with an external terminal write (kill): drop the
    /// stale cache entry and let the notification flow through.
    fn absorb_terminal(&mut self, task_id: TaskId) -> Disposition {
        tracing::debug!(%task_id, "task reached a terminal state concurrently");
        self.metrics.record_dropped_event("terminal_task");
        self.evict(task_id);
        Disposition::AlreadyTerminal
    }

    fn evict(&mut self, task_id: TaskId) {
        self.cache.remove(&task_id);
        self.metrics.set_tracked_tasks(self.cache.len());
    }
}

fn is_terminal_interrupt(error: &Error) -> bool {
    matches!(
        error,
        Error::TaskAlreadyTerminal { .. } | Error::InvalidStateTransition { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryOutbox;
    use crate::store::memory::InMemoryProgressStore;
    use crate::task::TaskInfo;
    use std::time::Duration;

    fn quick_config() -> AccumulatorConfig {
        AccumulatorConfig {
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    fn accumulator_over(store: &Arc<InMemoryProgressStore>) -> ProgressAccumulator {
        ProgressAccumulator::new(
            Arc::clone(store) as Arc<dyn TaskStore>,
            Arc::clone(store) as Arc<dyn RecordLog>,
            Arc::clone(store) as Arc<dyn ErrorLog>,
            quick_config(),
        )
    }

    async fn seed_queued_task(
        store: &InMemoryProgressStore,
        task_id: TaskId,
        expected: u64,
    ) -> Result<()> {
        let mut task = TaskInfo::new(task_id, "harvest");
        task.set_expected_count(expected)?;
        task.transition_to(TaskState::Queued, "records enqueued")?;
        store.insert_task(&task).await
    }

    #[tokio::test]
    async fn first_notification_activates_the_task() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 3).await?;

        let disposition = accumulator
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await?;
        assert_eq!(disposition, Disposition::Applied);

        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.state, TaskState::Active);
        assert_eq!(task.processed_count, 1);
        assert_eq!(outbox.events().len(), 1);
        assert_eq!(outbox.events()[0].event_type, "tally.task_started");

        Ok(())
    }

    #[tokio::test]
    async fn last_notification_finalizes_cleanly() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 2).await?;

        accumulator
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await?;
        let disposition = accumulator
            .handle(
                &Notification::success(task_id, "rec-2").last(),
                &mut outbox,
            )
            .await?;
        assert_eq!(disposition, Disposition::Finalized(TaskState::Finished));

        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.state, TaskState::Finished);
        assert_eq!(task.processed_count, 2);
        assert_eq!(task.errored_count, 0);
        assert_eq!(accumulator.tracked_tasks(), 0);

        let types: Vec<_> = outbox.events().iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["tally.task_started", "tally.task_finished"]);

        Ok(())
    }

    #[tokio::test]
    async fn errors_steer_the_terminal_state() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 2).await?;

        accumulator
            .handle(
                &Notification::error(task_id, "rec-1", "schema mismatch"),
                &mut outbox,
            )
            .await?;
        let disposition = accumulator
            .handle(
                &Notification::success(task_id, "rec-2").last(),
                &mut outbox,
            )
            .await?;
        assert_eq!(
            disposition,
            Disposition::Finalized(TaskState::FinishedWithErrors)
        );

        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.state, TaskState::FinishedWithErrors);
        assert_eq!(task.errored_count, 1);

        let report = store.error_report(task_id).await?;
        assert_eq!(report.total_errors(), 1);
        assert_eq!(report.groups[0].message, "schema mismatch");

        Ok(())
    }

    #[tokio::test]
    async fn count_reaching_expected_finalizes_without_hint() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 2).await?;

        accumulator
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await?;
        // No is_last hint; the count backstop fires.
        let disposition = accumulator
            .handle(&Notification::success(task_id, "rec-2"), &mut outbox)
            .await?;
        assert_eq!(disposition, Disposition::Finalized(TaskState::Finished));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_task_is_dropped() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();

        let disposition = accumulator
            .handle(
                &Notification::success(TaskId::new(404), "rec-1"),
                &mut outbox,
            )
            .await?;
        assert_eq!(disposition, Disposition::UnknownTask);
        assert!(outbox.events().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn pending_task_notifications_are_rejected() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        store.insert_task(&TaskInfo::new(task_id, "harvest")).await?;

        let disposition = accumulator
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await?;
        assert_eq!(disposition, Disposition::NotQueued);

        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.attempted(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_records_count_once() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 2).await?;

        accumulator
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await?;
        let disposition = accumulator
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await?;
        assert_eq!(disposition, Disposition::DuplicateRecord);

        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.processed_count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn terminal_event_twice_does_not_reterminate() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 1).await?;

        let last = Notification::success(task_id, "rec-1").last();
        let disposition = accumulator.handle(&last, &mut outbox).await?;
        assert_eq!(disposition, Disposition::Finalized(TaskState::Finished));

        // Redelivery of the finalizing notification: cold cache, warm store.
        let disposition = accumulator.handle(&last, &mut outbox).await?;
        assert_eq!(disposition, Disposition::AlreadyTerminal);

        // Exactly one terminal event was emitted
        let terminal_events = outbox
            .events()
            .iter()
            .filter(|e| e.event_type == "tally.task_finished")
            .count();
        assert_eq!(terminal_events, 1);

        Ok(())
    }

    #[tokio::test]
    async fn killed_task_absorbs_inflight_notifications() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 3).await?;

        accumulator
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await?;

        // External kill while the cache still thinks the task is active
        store.drop_task(task_id, "dropped by the user").await?;

        let disposition = accumulator
            .handle(&Notification::success(task_id, "rec-2"), &mut outbox)
            .await?;
        assert_eq!(disposition, Disposition::AlreadyTerminal);

        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.state, TaskState::Dropped);
        assert_eq!(task.processed_count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn transient_store_faults_are_retried() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 1).await?;

        // Two faults fit inside the three-attempt budget
        store.fail_next(2);
        let disposition = accumulator
            .handle(
                &Notification::success(task_id, "rec-1").last(),
                &mut outbox,
            )
            .await?;
        assert_eq!(disposition, Disposition::Finalized(TaskState::Finished));

        Ok(())
    }

    #[tokio::test]
    async fn exhausted_retries_leave_last_persisted_state() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = accumulator_over(&store);
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 2).await?;

        // More faults than the three-attempt budget can absorb
        store.fail_next(10);
        let result = accumulator
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await;
        assert!(result.is_err());

        // Burn the remaining budget, then verify nothing was persisted
        store.fail_next(0);
        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.state, TaskState::Queued);
        assert_eq!(task.attempted(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn cold_cache_recovers_counters_from_store() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut outbox = InMemoryOutbox::new();
        let task_id = TaskId::new(1);
        seed_queued_task(&store, task_id, 2).await?;

        let mut first = accumulator_over(&store);
        first
            .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
            .await?;
        drop(first);

        // A fresh accumulator resumes from persisted counters
        let mut second = accumulator_over(&store);
        let disposition = second
            .handle(
                &Notification::success(task_id, "rec-2").last(),
                &mut outbox,
            )
            .await?;
        assert_eq!(disposition, Disposition::Finalized(TaskState::Finished));

        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.processed_count, 2);

        Ok(())
    }

    #[tokio::test]
    async fn cache_evicts_least_recently_touched() -> Result<()> {
        let store = Arc::new(InMemoryProgressStore::new());
        let mut accumulator = ProgressAccumulator::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            Arc::clone(&store) as Arc<dyn RecordLog>,
            Arc::clone(&store) as Arc<dyn ErrorLog>,
            AccumulatorConfig {
                retry: RetryPolicy::new(1, Duration::ZERO),
                cache_capacity: 2,
            },
        );
        let mut outbox = InMemoryOutbox::new();

        for i in 1..=3 {
            let task_id = TaskId::new(i);
            seed_queued_task(&store, task_id, 10).await?;
            accumulator
                .handle(&Notification::success(task_id, "rec-1"), &mut outbox)
                .await?;
        }

        assert_eq!(accumulator.tracked_tasks(), 2);

        // The evicted task still works - counters recover from the store
        let disposition = accumulator
            .handle(&Notification::success(TaskId::new(1), "rec-2"), &mut outbox)
            .await?;
        assert_eq!(disposition, Disposition::Applied);
        let task = store.find_task(TaskId::new(1)).await?.unwrap();
        assert_eq!(task.processed_count, 2);

        Ok(())
    }
}
