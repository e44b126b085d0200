//! Pluggable storage for progress-bookkeeping state.
//!
//! Three traits split the persistence surface along the lines the domain
//! actually uses them:
//!
//! - [`TaskStore`]: task rows with atomic counter increments and guarded
//!   terminal transitions
//! - [`RecordLog`]: per-record entries for duplicate detection
//! - [`ErrorLog`]: grouped error bookkeeping
//!
//! ## Design Principles
//!
//! - **Atomic increments**: `update_progress` is the single point of
//!   serialization for counters; callers never read-modify-write
//! - **Monotonic state**: terminal transitions are validated and idempotent
//!   in the store, so concurrent finalizers cannot revert a task
//! - **Testability**: In-memory implementation for testing, a database-backed
//!   implementation for production

pub mod memory;

use async_trait::async_trait;

use tally_core::{ErrorTypeId, TaskId};

use crate::error::Result;
use crate::records::ProcessedRecord;
use crate::report::{ErrorSample, TaskErrorReport};
use crate::task::{ProgressCounts, TaskInfo, TaskState};

/// Storage abstraction for task bookkeeping rows.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent access from workers
/// and the accumulator loop.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Gets a task by ID.
    ///
    /// Returns `None` if the task does not exist.
    async fn find_task(&self, task_id: TaskId) -> Result<Option<TaskInfo>>;

    /// Inserts a new task row.
    async fn insert_task(&self, task: &TaskInfo) -> Result<()>;

    /// Records the expected record count, exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::ExpectedCountAlreadySet`] if a count was
    /// recorded earlier, or [`crate::error::Error::TaskNotFound`] if the task
    /// does not exist.
    async fn set_expected_count(&self, task_id: TaskId, expected: u64) -> Result<()>;

    /// Transitions a task to a new state with a description.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist or the transition is
    /// invalid.
    async fn update_state(
        &self,
        task_id: TaskId,
        state: TaskState,
        description: &str,
    ) -> Result<()>;

    /// Atomically increments the progress counters and returns the new totals.
    ///
    /// This is the single point of serialization for counters across
    /// concurrent writers.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist or the increment would
    /// push attempted records past the expected count.
    async fn update_progress(
        &self,
        task_id: TaskId,
        processed_delta: u64,
        errored_delta: u64,
    ) -> Result<ProgressCounts>;

    /// Finalizes a task: writes final counts and a terminal state.
    ///
    /// Returns `Ok(true)` if the terminal transition was applied, `Ok(false)`
    /// if the task was already in the same terminal state (idempotent no-op).
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist, the target is not
    /// terminal, or the task sits in a different terminal state.
    async fn finish_task(
        &self,
        task_id: TaskId,
        processed: u64,
        errored: u64,
        state: TaskState,
        description: &str,
    ) -> Result<bool>;

    /// Drops a task (terminal DROPPED state) with a reason.
    ///
    /// Returns `Ok(true)` if the drop was applied, `Ok(false)` if the task
    /// was already terminal; a cancellation racing with completion is a
    /// benign no-op, never a revert.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist.
    async fn drop_task(&self, task_id: TaskId, reason: &str) -> Result<bool>;
}

/// Storage abstraction for per-record processing state.
#[async_trait]
pub trait RecordLog: Send + Sync {
    /// Gets a record entry by task and record ID.
    async fn record(&self, task_id: TaskId, record_id: &str) -> Result<Option<ProcessedRecord>>;

    /// Inserts or replaces a record entry.
    async fn put_record(&self, record: &ProcessedRecord) -> Result<()>;
}

/// Storage abstraction for grouped error bookkeeping.
#[async_trait]
pub trait ErrorLog: Send + Sync {
    /// Records an error occurrence, grouping identical messages.
    ///
    /// Returns the error type ID of the group the occurrence joined.
    async fn record_error(
        &self,
        task_id: TaskId,
        message: &str,
        sample: ErrorSample,
    ) -> Result<ErrorTypeId>;

    /// Returns the error report for a task.
    ///
    /// Tasks with no recorded errors yield an empty report.
    async fn error_report(&self, task_id: TaskId) -> Result<TaskErrorReport>;
}
