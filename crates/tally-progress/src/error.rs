//! Error types for the progress-bookkeeping domain.

use tally_core::TaskId;

/// The result type used throughout tally-progress.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in progress-bookkeeping operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A task was not found in the backing store.
    #[error("task not found: {task_id}")]
    TaskNotFound {
        /// The task ID that was not found.
        task_id: TaskId,
    },

    /// An invalid state transition was attempted.
    #[error("invalid state transition: {from} -> {to} ({reason})")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },

    /// The expected record count was already recorded for a task.
    ///
    /// Expected counts are set exactly once; late corrections from the
    /// enumerator are rejected.
    #[error("expected count already set for task {task_id}: {existing}")]
    ExpectedCountAlreadySet {
        /// The task whose count was already set.
        task_id: TaskId,
        /// The previously recorded expected count.
        existing: u64,
    },

    /// A counter increment would push attempted records past the expected count.
    #[error("task {task_id} attempted {attempted} records but expected only {expected}")]
    ExpectedCountExceeded {
        /// The task whose counters overflowed.
        task_id: TaskId,
        /// The expected record count.
        expected: u64,
        /// The attempted (processed + errored) count after the increment.
        attempted: u64,
    },

    /// A task already reached a terminal state; the operation is void.
    #[error("task {task_id} is already terminal ({state})")]
    TaskAlreadyTerminal {
        /// The terminal task.
        task_id: TaskId,
        /// The terminal state it sits in.
        state: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An error from tally-core.
    #[error("core error: {0}")]
    Core(#[from] tally_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if retrying the failed operation could succeed.
    ///
    /// Only storage failures are transient; domain errors (unknown task,
    /// invalid transition, count overflow) are permanent and repeat
    /// identically on every attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}
