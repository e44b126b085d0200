//! In-memory store implementation for testing.
//!
//! This module provides [`InMemoryProgressStore`], a simple in-memory
//! implementation of [`TaskStore`], [`RecordLog`], and [`ErrorLog`] suitable
//! for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process coordination
//! - **Single-process only**: State is not shared across process boundaries
//! - **No persistence**: All state is lost when the process exits
//!
//! ## Fault Injection
//!
//! Tests exercising retry paths can arm a transient fault budget with
//! [`InMemoryProgressStore::fail_next`]: the next `n` store operations fail
//! with a storage error before behavior returns to normal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use tally_core::{ErrorTypeId, TaskId};

use super::{ErrorLog, RecordLog, TaskStore};
use crate::error::{Error, Result};
use crate::records::ProcessedRecord;
use crate::report::{ErrorSample, TaskErrorReport};
use crate::task::{ProgressCounts, TaskInfo, TaskState};

/// In-memory store for testing.
///
/// Provides a simple, thread-safe implementation of the storage traits using
/// `RwLock` for synchronization.
///
/// ## Example
///
/// ```rust
/// use tally_progress::store::memory::InMemoryProgressStore;
///
/// let store = InMemoryProgressStore::new();
/// // Use store in tests...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    tasks: RwLock<HashMap<TaskId, TaskInfo>>,
    records: RwLock<HashMap<(TaskId, String), ProcessedRecord>>,
    errors: RwLock<HashMap<TaskId, TaskErrorReport>>,
    fault_budget: AtomicU32,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

impl InMemoryProgressStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a transient fault budget: the next `n` operations fail with a
    /// storage error.
    pub fn fail_next(&self, n: u32) {
        self.fault_budget.store(n, Ordering::SeqCst);
    }

    /// Returns the number of tasks currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn task_count(&self) -> Result<usize> {
        let count = {
            let tasks = self.tasks.read().map_err(poison_err)?;
            tasks.len()
        };
        Ok(count)
    }

    fn check_fault(&self) -> Result<()> {
        let armed = self
            .fault_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(Error::storage("injected store fault"));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryProgressStore {
    async fn find_task(&self, task_id: TaskId) -> Result<Option<TaskInfo>> {
        self.check_fault()?;
        let result = {
            let tasks = self.tasks.read().map_err(poison_err)?;
            tasks.get(&task_id).cloned()
        };
        Ok(result)
    }

    async fn insert_task(&self, task: &TaskInfo) -> Result<()> {
        self.check_fault()?;
        {
            let mut tasks = self.tasks.write().map_err(poison_err)?;
            tasks.insert(task.task_id, task.clone());
        }
        Ok(())
    }

    async fn set_expected_count(&self, task_id: TaskId, expected: u64) -> Result<()> {
        self.check_fault()?;
        let mut tasks = self.tasks.write().map_err(poison_err)?;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(Error::TaskNotFound { task_id })?;
        task.set_expected_count(expected)
    }

    async fn update_state(
        &self,
        task_id: TaskId,
        state: TaskState,
        description: &str,
    ) -> Result<()> {
        self.check_fault()?;
        let mut tasks = self.tasks.write().map_err(poison_err)?;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(Error::TaskNotFound { task_id })?;
        task.transition_to(state, description)
    }

    async fn update_progress(
        &self,
        task_id: TaskId,
        processed_delta: u64,
        errored_delta: u64,
    ) -> Result<ProgressCounts> {
        self.check_fault()?;
        let mut tasks = self.tasks.write().map_err(poison_err)?;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(Error::TaskNotFound { task_id })?;

        if task.is_terminal() {
            return Err(Error::TaskAlreadyTerminal {
                task_id,
                state: task.state.to_string(),
            });
        }

        let attempted = task.attempted() + processed_delta + errored_delta;
        if let Some(expected) = task.expected_count {
            if attempted > expected {
                return Err(Error::ExpectedCountExceeded {
                    task_id,
                    expected,
                    attempted,
                });
            }
        }

        task.processed_count += processed_delta;
        task.errored_count += errored_delta;
        Ok(task.counts())
    }

    async fn finish_task(
        &self,
        task_id: TaskId,
        processed: u64,
        errored: u64,
        state: TaskState,
        description: &str,
    ) -> Result<bool> {
        self.check_fault()?;
        let mut tasks = self.tasks.write().map_err(poison_err)?;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(Error::TaskNotFound { task_id })?;

        let applied = task.try_terminal_transition(state, description)?;
        if applied {
            task.processed_count = processed;
            task.errored_count = errored;
        }
        Ok(applied)
    }

    async fn drop_task(&self, task_id: TaskId, reason: &str) -> Result<bool> {
        self.check_fault()?;
        let mut tasks = self.tasks.write().map_err(poison_err)?;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(Error::TaskNotFound { task_id })?;

        if task.is_terminal() {
            return Ok(false);
        }
        task.transition_to(TaskState::Dropped, reason)?;
        Ok(true)
    }
}

#[async_trait]
impl RecordLog for InMemoryProgressStore {
    async fn record(&self, task_id: TaskId, record_id: &str) -> Result<Option<ProcessedRecord>> {
        self.check_fault()?;
        let result = {
            let records = self.records.read().map_err(poison_err)?;
            records.get(&(task_id, record_id.to_string())).cloned()
        };
        Ok(result)
    }

    async fn put_record(&self, record: &ProcessedRecord) -> Result<()> {
        self.check_fault()?;
        {
            let mut records = self.records.write().map_err(poison_err)?;
            records.insert(
                (record.task_id, record.record_id.clone()),
                record.clone(),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ErrorLog for InMemoryProgressStore {
    async fn record_error(
        &self,
        task_id: TaskId,
        message: &str,
        sample: ErrorSample,
    ) -> Result<ErrorTypeId> {
        self.check_fault()?;
        let mut errors = self.errors.write().map_err(poison_err)?;
        let report = errors
            .entry(task_id)
            .or_insert_with(|| TaskErrorReport::new(task_id));
        let (error_type, stored) = report.record(message, sample);
        if !stored {
            tracing::warn!(%task_id, message, "error sample cap reached, counting only");
        }
        Ok(error_type)
    }

    async fn error_report(&self, task_id: TaskId) -> Result<TaskErrorReport> {
        self.check_fault()?;
        let report = {
            let errors = self.errors.read().map_err(poison_err)?;
            errors.get(&task_id).cloned()
        };
        Ok(report.unwrap_or_else(|| TaskErrorReport::new(task_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::RecordOutcome;

    fn queued_task(task_id: TaskId, expected: u64) -> TaskInfo {
        let mut task = TaskInfo::new(task_id, "harvest");
        task.set_expected_count(expected).unwrap();
        task.transition_to(TaskState::Queued, "records enqueued")
            .unwrap();
        task
    }

    #[tokio::test]
    async fn insert_and_find_task() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);

        assert!(store.find_task(task_id).await?.is_none());

        store.insert_task(&TaskInfo::new(task_id, "harvest")).await?;

        let found = store.find_task(task_id).await?;
        assert!(found.is_some_and(|t| t.state == TaskState::Pending));
        assert_eq!(store.task_count()?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn expected_count_is_set_once() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);
        store.insert_task(&TaskInfo::new(task_id, "harvest")).await?;

        store.set_expected_count(task_id, 5).await?;
        let result = store.set_expected_count(task_id, 6).await;
        assert!(matches!(
            result,
            Err(Error::ExpectedCountAlreadySet { existing: 5, .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn update_progress_accumulates() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);
        store.insert_task(&queued_task(task_id, 10)).await?;

        let counts = store.update_progress(task_id, 1, 0).await?;
        assert_eq!(counts, ProgressCounts::new(1, 0));

        let counts = store.update_progress(task_id, 0, 1).await?;
        assert_eq!(counts, ProgressCounts::new(1, 1));
        assert_eq!(counts.attempted(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn update_progress_enforces_expected_bound() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);
        store.insert_task(&queued_task(task_id, 1)).await?;

        store.update_progress(task_id, 1, 0).await?;
        let result = store.update_progress(task_id, 1, 0).await;
        assert!(matches!(
            result,
            Err(Error::ExpectedCountExceeded { expected: 1, .. })
        ));

        // The rejected increment left counters untouched
        let task = store.find_task(task_id).await?.unwrap();
        assert_eq!(task.attempted(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn update_progress_unknown_task() {
        let store = InMemoryProgressStore::new();
        let result = store.update_progress(TaskId::new(404), 1, 0).await;
        assert!(matches!(result, Err(Error::TaskNotFound { .. })));
    }

    #[tokio::test]
    async fn counters_are_frozen_after_terminal_state() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);
        let mut task = queued_task(task_id, 5);
        task.transition_to(TaskState::Active, "processing first record")?;
        store.insert_task(&task).await?;

        store.drop_task(task_id, "dropped by the user").await?;

        let result = store.update_progress(task_id, 1, 0).await;
        assert!(matches!(result, Err(Error::TaskAlreadyTerminal { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn finish_task_is_idempotent() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);
        let mut task = queued_task(task_id, 1);
        task.transition_to(TaskState::Active, "processing first record")?;
        task.record_outcome(RecordOutcome::Success)?;
        store.insert_task(&task).await?;

        let applied = store
            .finish_task(task_id, 1, 0, TaskState::Finished, "completely processed")
            .await?;
        assert!(applied);

        let applied = store
            .finish_task(task_id, 1, 0, TaskState::Finished, "completely processed")
            .await?;
        assert!(!applied);

        let found = store.find_task(task_id).await?.unwrap();
        assert_eq!(found.state, TaskState::Finished);
        assert_eq!(found.processed_count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn finish_task_rejects_conflicting_terminal() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);
        let mut task = queued_task(task_id, 1);
        task.transition_to(TaskState::Active, "processing first record")?;
        store.insert_task(&task).await?;

        store
            .finish_task(task_id, 1, 0, TaskState::Finished, "completely processed")
            .await?;
        let result = store
            .finish_task(
                task_id,
                1,
                1,
                TaskState::FinishedWithErrors,
                "completed with errors",
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidStateTransition { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn drop_task_is_a_noop_on_terminal_tasks() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);
        let mut task = queued_task(task_id, 1);
        task.transition_to(TaskState::Active, "processing first record")?;
        store.insert_task(&task).await?;

        assert!(store.drop_task(task_id, "dropped by the user").await?);
        assert!(!store.drop_task(task_id, "dropped again").await?);

        let found = store.find_task(task_id).await?.unwrap();
        assert_eq!(found.state, TaskState::Dropped);
        assert_eq!(found.state_description, "dropped by the user");

        Ok(())
    }

    #[tokio::test]
    async fn record_log_tracks_finished_records() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);

        assert!(store.record(task_id, "rec-1").await?.is_none());

        let record =
            ProcessedRecord::finished(task_id, "rec-1", RecordOutcome::Success, None);
        store.put_record(&record).await?;

        let found = store.record(task_id, "rec-1").await?;
        assert!(found.is_some_and(|r| r.is_finished()));

        Ok(())
    }

    #[tokio::test]
    async fn error_log_groups_by_message() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);

        let first = store
            .record_error(task_id, "schema mismatch", ErrorSample::new("rec-1", None))
            .await?;
        let second = store
            .record_error(task_id, "schema mismatch", ErrorSample::new("rec-2", None))
            .await?;
        assert_eq!(first, second);

        let report = store.error_report(task_id).await?;
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.total_errors(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn error_report_for_clean_task_is_empty() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let report = store.error_report(TaskId::new(9)).await?;
        assert!(report.groups.is_empty());
        assert_eq!(report.total_errors(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn fault_budget_fails_then_recovers() -> Result<()> {
        let store = InMemoryProgressStore::new();
        let task_id = TaskId::new(1);
        store.insert_task(&TaskInfo::new(task_id, "harvest")).await?;

        store.fail_next(2);
        assert!(store.find_task(task_id).await.is_err());
        assert!(store.find_task(task_id).await.is_err());
        assert!(store.find_task(task_id).await.is_ok());

        Ok(())
    }
}
