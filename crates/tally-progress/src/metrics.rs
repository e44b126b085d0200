//! Observability metrics for progress bookkeeping.
//!
//! This module provides Prometheus-compatible metrics for monitoring the
//! accumulator and worker pool. Metrics are exposed via the `metrics` crate
//! facade; wire up an exporter at application startup to publish them.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tally_notifications_total` | Counter | `outcome` | Notifications consumed by outcome |
//! | `tally_task_transitions_total` | Counter | `from_state`, `to_state` | Task state transitions |
//! | `tally_dropped_events_total` | Counter | `reason` | Notifications dropped without effect |
//! | `tally_retries_total` | Counter | `operation` | Store operation retry attempts |
//! | `tally_tracked_tasks` | Gauge | - | Tasks with live counter cache entries |
//! | `tally_queue_depth` | Gauge | `queue` | Items waiting in a channel |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tally_progress::metrics::ProgressMetrics;
//!
//! let metrics = ProgressMetrics::new();
//!
//! // Record a consumed notification
//! metrics.record_notification("success");
//!
//! // Record a task state transition
//! metrics.record_task_transition("active", "finished");
//! ```

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Notifications consumed by outcome.
    pub const NOTIFICATIONS_TOTAL: &str = "tally_notifications_total";
    /// Counter: Task state transitions.
    pub const TASK_TRANSITIONS_TOTAL: &str = "tally_task_transitions_total";
    /// Counter: Notifications dropped without effect.
    pub const DROPPED_EVENTS_TOTAL: &str = "tally_dropped_events_total";
    /// Counter: Store operation retry attempts.
    pub const RETRIES_TOTAL: &str = "tally_retries_total";
    /// Gauge: Tasks with live counter cache entries.
    pub const TRACKED_TASKS: &str = "tally_tracked_tasks";
    /// Gauge: Items waiting in a channel.
    pub const QUEUE_DEPTH: &str = "tally_queue_depth";
}

/// Label keys used across metrics.
pub mod labels {
    /// Record outcome (success, error).
    pub const OUTCOME: &str = "outcome";
    /// Previous task state (for transitions).
    pub const FROM_STATE: &str = "from_state";
    /// Target task state (for transitions).
    pub const TO_STATE: &str = "to_state";
    /// Reason a notification was dropped (unknown_task, duplicate_record, ...).
    pub const REASON: &str = "reason";
    /// Name of the retried store operation.
    pub const OPERATION: &str = "operation";
    /// Queue name for depth metrics.
    pub const QUEUE: &str = "queue";
}

/// High-level interface for recording progress metrics.
///
/// Cheap to clone and share across tasks.
#[derive(Debug, Clone, Default)]
pub struct ProgressMetrics;

impl ProgressMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a consumed notification.
    pub fn record_notification(&self, outcome: &str) {
        counter!(
            names::NOTIFICATIONS_TOTAL,
            labels::OUTCOME => outcome.to_string(),
        )
        .increment(1);
    }

    /// Records a task state transition.
    pub fn record_task_transition(&self, from_state: &str, to_state: &str) {
        counter!(
            names::TASK_TRANSITIONS_TOTAL,
            labels::FROM_STATE => from_state.to_string(),
            labels::TO_STATE => to_state.to_string(),
        )
        .increment(1);
    }

    /// Records a notification dropped without effect.
    pub fn record_dropped_event(&self, reason: &str) {
        counter!(
            names::DROPPED_EVENTS_TOTAL,
            labels::REASON => reason.to_string(),
        )
        .increment(1);
    }

    /// Sets the number of tasks with live counter cache entries.
    #[allow(clippy::cast_precision_loss)] // Gauge values are typically small
    pub fn set_tracked_tasks(&self, count: usize) {
        gauge!(names::TRACKED_TASKS).set(count as f64);
    }

    /// Sets the depth of a named channel.
    #[allow(clippy::cast_precision_loss)] // Gauge values are typically small
    pub fn set_queue_depth(&self, queue: &str, depth: usize) {
        gauge!(
            names::QUEUE_DEPTH,
            labels::QUEUE => queue.to_string(),
        )
        .set(depth as f64);
    }
}

/// Records a retry attempt for a store operation.
///
/// Lives at module level so the retry helper can record without threading a
/// recorder through every call site.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        labels::OPERATION => operation.to_string(),
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_can_record_without_recorder_installed() {
        // These calls should not panic even without a metrics recorder installed
        let metrics = ProgressMetrics::new();
        metrics.record_notification("success");
        metrics.record_task_transition("active", "finished");
        metrics.record_dropped_event("unknown_task");
        record_retry("update_progress");
    }

    #[test]
    fn metrics_can_set_gauges() {
        let metrics = ProgressMetrics::new();
        metrics.set_tracked_tasks(5);
        metrics.set_queue_depth("notifications", 10);
    }
}
