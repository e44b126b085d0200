//! Per-record processing state.
//!
//! The record log keeps one entry per (task, record) pair so that replayed
//! notifications (retried deliveries, restarted workers) can be detected
//! and counted at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::TaskId;

use crate::notification::RecordOutcome;

/// Processing state of a single record within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    /// Enqueued for processing, no outcome yet.
    Queued,
    /// Processed successfully.
    Success,
    /// Processing failed.
    Error,
}

impl RecordState {
    /// Returns true if the record reached a final outcome.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl From<RecordOutcome> for RecordState {
    fn from(outcome: RecordOutcome) -> Self {
        match outcome {
            RecordOutcome::Success => Self::Success,
            RecordOutcome::Error => Self::Error,
        }
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "QUEUED"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Record-log entry for a single (task, record) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRecord {
    /// The task the record belongs to.
    pub task_id: TaskId,
    /// Resource reference identifying the record.
    pub record_id: String,
    /// Current processing state.
    pub state: RecordState,
    /// When processing of the record started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Diagnostic text attached to the final outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl ProcessedRecord {
    /// Creates a queued record entry.
    #[must_use]
    pub fn queued(task_id: TaskId, record_id: impl Into<String>) -> Self {
        Self {
            task_id,
            record_id: record_id.into(),
            state: RecordState::Queued,
            started_at: Some(Utc::now()),
            info: None,
        }
    }

    /// Creates a finished record entry from an outcome.
    #[must_use]
    pub fn finished(
        task_id: TaskId,
        record_id: impl Into<String>,
        outcome: RecordOutcome,
        info: Option<String>,
    ) -> Self {
        Self {
            task_id,
            record_id: record_id.into(),
            state: outcome.into(),
            started_at: Some(Utc::now()),
            info,
        }
    }

    /// Returns true if the record reached a final outcome.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.state.is_finished()
    }
}
