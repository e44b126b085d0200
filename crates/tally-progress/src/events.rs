//! Task lifecycle events.
//!
//! Every durable task transition is mirrored as an event pushed to an
//! [`EventSink`], replacing in-band tuple emission with an explicit outbox
//! that callers drain and forward wherever they like (a message queue, an
//! append-only ledger, a test assertion).
//!
//! ## Why ULID for Event IDs
//!
//! Event identifiers are [ULID](https://github.com/ulid/spec)s:
//! lexicographically sortable, timestamp-prefixed, and generated without
//! coordination, so consumers get a usable ordering from the ID alone.
//!
//! ## Idempotency
//!
//! Each envelope carries a deterministic `idempotency_key` derived from the
//! task ID and event name. A task emits each lifecycle event at most once, so
//! downstream consumers can deduplicate redelivered envelopes by key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use tally_core::TaskId;

/// Payload of a task lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskEventData {
    /// A task was submitted.
    TaskSubmitted {
        /// The submitted task.
        task_id: TaskId,
        /// The pipeline the task runs on.
        pipeline: String,
    },
    /// Record enumeration completed and the expected count is known.
    TaskQueued {
        /// The queued task.
        task_id: TaskId,
        /// Total records the task will produce notifications for.
        expected_count: u64,
    },
    /// The first record notification was observed.
    TaskStarted {
        /// The now-active task.
        task_id: TaskId,
    },
    /// Every expected record processed, zero errors.
    TaskFinished {
        /// The finished task.
        task_id: TaskId,
        /// Final success count.
        processed_count: u64,
        /// Final error count (always zero here).
        errored_count: u64,
    },
    /// Every expected record processed, at least one error.
    TaskFailed {
        /// The failed task.
        task_id: TaskId,
        /// Final success count.
        processed_count: u64,
        /// Final error count.
        errored_count: u64,
    },
    /// The task was dropped (killed or empty).
    TaskDropped {
        /// The dropped task.
        task_id: TaskId,
        /// Why the task was dropped.
        reason: String,
    },
}

impl TaskEventData {
    /// Returns the event name used in the envelope type and idempotency key.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::TaskSubmitted { .. } => "task_submitted",
            Self::TaskQueued { .. } => "task_queued",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskFinished { .. } => "task_finished",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskDropped { .. } => "task_dropped",
        }
    }

    /// Returns the task the event belongs to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::TaskSubmitted { task_id, .. }
            | Self::TaskQueued { task_id, .. }
            | Self::TaskStarted { task_id }
            | Self::TaskFinished { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskDropped { task_id, .. } => *task_id,
        }
    }
}

/// Envelope for a task lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    /// Unique event identifier (ULID).
    pub id: String,
    /// Event type.
    /// Format: `tally.{event_name}` (e.g., `tally.task_finished`)
    pub event_type: String,
    /// Event timestamp.
    pub time: DateTime<Utc>,
    /// Deduplication key: `{task_id}:{event_name}`.
    pub idempotency_key: String,
    /// Event payload.
    pub data: TaskEventData,
}

impl TaskEvent {
    /// Creates a new event envelope with auto-generated ID and timestamp.
    #[must_use]
    pub fn new(data: TaskEventData) -> Self {
        Self {
            id: Ulid::new().to_string(),
            event_type: format!("tally.{}", data.event_name()),
            time: Utc::now(),
            idempotency_key: format!("{}:{}", data.task_id(), data.event_name()),
            data,
        }
    }
}

/// A sink for lifecycle events emitted by bookkeeping operations.
///
/// Intentionally synchronous: the accumulator stays deterministic and
/// side-effect free, while callers decide when and how to persist events.
pub trait EventSink {
    /// Records an event for later persistence.
    fn push(&mut self, event: TaskEvent);
}

/// In-memory outbox for collecting lifecycle events.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    events: Vec<TaskEvent>,
}

impl InMemoryOutbox {
    /// Creates a new empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> &[TaskEvent] {
        &self.events
    }

    /// Drains the outbox, returning all events in insertion order.
    pub fn drain(&mut self) -> Vec<TaskEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for InMemoryOutbox {
    fn push(&mut self, event: TaskEvent) {
        self.events.push(event);
    }
}
