//! Per-task error bookkeeping.
//!
//! Identical diagnostic messages are grouped under a generated
//! [`ErrorTypeId`]; each group keeps an occurrence counter and a bounded set
//! of sample records. Beyond the sample cap only the counter grows, so a
//! pathological task cannot balloon the error log.

use serde::{Deserialize, Serialize};

use tally_core::{ErrorTypeId, TaskId};

/// Maximum number of stored sample records per error group.
pub const MAX_SAMPLES_PER_ERROR_TYPE: usize = 100;

/// A single sampled error occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSample {
    /// Resource reference of the failing record.
    pub record: String,
    /// Additional detail beyond the group message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorSample {
    /// Creates a sample for a failing record.
    #[must_use]
    pub fn new(record: impl Into<String>, details: Option<String>) -> Self {
        Self {
            record: record.into(),
            details,
        }
    }
}

/// A group of identical diagnostic messages for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorGroup {
    /// Identifier of the group.
    pub error_type: ErrorTypeId,
    /// The shared diagnostic message.
    pub message: String,
    /// Total occurrences, including unsampled ones.
    pub count: u64,
    /// Stored samples, capped at [`MAX_SAMPLES_PER_ERROR_TYPE`].
    pub samples: Vec<ErrorSample>,
}

impl ErrorGroup {
    /// Creates an empty group for a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorTypeId::generate(),
            message: message.into(),
            count: 0,
            samples: Vec::new(),
        }
    }

    /// Records an occurrence.
    ///
    /// Returns true if the sample was stored, false if the cap was reached
    /// and only the counter advanced.
    pub fn record(&mut self, sample: ErrorSample) -> bool {
        self.count += 1;
        if self.samples.len() < MAX_SAMPLES_PER_ERROR_TYPE {
            self.samples.push(sample);
            true
        } else {
            false
        }
    }
}

/// Error bookkeeping for a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskErrorReport {
    /// The task the report belongs to.
    pub task_id: TaskId,
    /// Error groups, in first-seen order.
    pub groups: Vec<ErrorGroup>,
}

impl TaskErrorReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            groups: Vec::new(),
        }
    }

    /// Records an error occurrence, grouping by message.
    ///
    /// Returns the group's error type ID and whether the sample was stored.
    pub fn record(&mut self, message: &str, sample: ErrorSample) -> (ErrorTypeId, bool) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.message == message) {
            let stored = group.record(sample);
            return (group.error_type, stored);
        }

        let mut group = ErrorGroup::new(message);
        let stored = group.record(sample);
        let error_type = group.error_type;
        self.groups.push(group);
        (error_type, stored)
    }

    /// Returns the total number of recorded errors across all groups.
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.groups.iter().map(|g| g.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_messages_share_a_group() {
        let mut report = TaskErrorReport::new(TaskId::new(1));

        let (first, _) = report.record("schema mismatch", ErrorSample::new("rec-1", None));
        let (second, _) = report.record("schema mismatch", ErrorSample::new("rec-2", None));
        let (other, _) = report.record("connection reset", ErrorSample::new("rec-3", None));

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.total_errors(), 3);
    }

    #[test]
    fn sample_storage_is_capped() {
        let mut report = TaskErrorReport::new(TaskId::new(1));

        for i in 0..MAX_SAMPLES_PER_ERROR_TYPE {
            let (_, stored) = report.record("flaky", ErrorSample::new(format!("rec-{i}"), None));
            assert!(stored);
        }

        // Counter keeps counting past the cap, samples do not grow
        let (_, stored) = report.record("flaky", ErrorSample::new("rec-overflow", None));
        assert!(!stored);

        let group = &report.groups[0];
        assert_eq!(group.count, MAX_SAMPLES_PER_ERROR_TYPE as u64 + 1);
        assert_eq!(group.samples.len(), MAX_SAMPLES_PER_ERROR_TYPE);
    }
}
