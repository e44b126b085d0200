//! Per-record notification events.
//!
//! Workers emit one [`Notification`] per processed record. Notifications are
//! ephemeral: the accumulator consumes each exactly once and retains nothing
//! beyond the task-level counters and the record log.

use serde::{Deserialize, Serialize};

use tally_core::TaskId;

/// Outcome of processing a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordOutcome {
    /// The record was processed successfully.
    Success,
    /// The record failed with a diagnostic.
    Error,
}

impl RecordOutcome {
    /// Returns true if this outcome is an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A per-record outcome signal used to update task-level bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// The task the record belongs to.
    pub task_id: TaskId,
    /// Resource reference identifying the record within the task.
    pub record: String,
    /// Whether the record succeeded or errored.
    pub outcome: RecordOutcome,
    /// Optional diagnostic text (error message or processing note).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Set by the upstream counting logic when this notification corresponds
    /// to the last expected record of the task.
    #[serde(default)]
    pub is_last: bool,
}

impl Notification {
    /// Creates a success notification for a record.
    #[must_use]
    pub fn success(task_id: TaskId, record: impl Into<String>) -> Self {
        Self {
            task_id,
            record: record.into(),
            outcome: RecordOutcome::Success,
            info: None,
            is_last: false,
        }
    }

    /// Creates an error notification with a diagnostic message.
    #[must_use]
    pub fn error(task_id: TaskId, record: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            task_id,
            record: record.into(),
            outcome: RecordOutcome::Error,
            info: Some(info.into()),
            is_last: false,
        }
    }

    /// Attaches diagnostic text.
    #[must_use]
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Flags this notification as carrying the last expected record.
    #[must_use]
    pub const fn last(mut self) -> Self {
        self.is_last = true;
        self
    }
}
