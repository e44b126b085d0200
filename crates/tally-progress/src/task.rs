//! Task bookkeeping state and lifecycle management.
//!
//! This module provides:
//! - `TaskState`: The state machine for bulk-task bookkeeping
//! - `TaskInfo`: Persisted bookkeeping state for a single task
//! - `ProgressCounts`: The processed/errored counter pair

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::TaskId;

use crate::error::{Error, Result};
use crate::notification::RecordOutcome;

/// Task bookkeeping state machine.
///
/// States follow a directed graph:
/// ```text
/// ┌─────────┐ enumerated ┌────────┐ first record ┌────────┐ last record ┌──────────┐
/// │ PENDING │───────────►│ QUEUED │─────────────►│ ACTIVE │────────────►│ FINISHED │
/// └─────────┘            └────────┘              └────────┘             └──────────┘
///      │                     │                       │      errors seen ┌──────────────────────┐
///      │                     │                       ├─────────────────►│ FINISHED_WITH_ERRORS │
///      │                     │                       │                  └──────────────────────┘
///      │                     │                       │
///      │     killed / empty  ▼                       │
///      └────────────────►┌─────────┐◄────────────────┘
///                        │ DROPPED │
///                        └─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Submitted, records not yet enumerated.
    Pending,
    /// Enumeration complete, expected record count known.
    Queued,
    /// Records being processed, notifications arriving.
    Active,
    /// Every expected record processed, zero errors.
    Finished,
    /// Every expected record processed, at least one error.
    FinishedWithErrors,
    /// Cancelled by the kill flag, or empty at enumeration time.
    Dropped,
}

impl TaskState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::FinishedWithErrors | Self::Dropped
        )
    }

    /// Returns true if the transition from self to target is valid.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(target, Self::Queued | Self::Dropped),
            Self::Queued => matches!(target, Self::Active | Self::Dropped),
            Self::Active => matches!(
                target,
                Self::Finished | Self::FinishedWithErrors | Self::Dropped
            ),
            Self::Finished | Self::FinishedWithErrors | Self::Dropped => false,
        }
    }

    /// Returns all valid target states from the current state.
    #[must_use]
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Pending => vec![Self::Queued, Self::Dropped],
            Self::Queued => vec![Self::Active, Self::Dropped],
            Self::Active => vec![Self::Finished, Self::FinishedWithErrors, Self::Dropped],
            Self::Finished | Self::FinishedWithErrors | Self::Dropped => vec![],
        }
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Finished => "finished",
            Self::FinishedWithErrors => "finished_with_errors",
            Self::Dropped => "dropped",
        }
    }

    /// Returns the terminal state matching a final error count.
    #[must_use]
    pub const fn terminal_for(errored: u64) -> Self {
        if errored == 0 {
            Self::Finished
        } else {
            Self::FinishedWithErrors
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Queued => write!(f, "QUEUED"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Finished => write!(f, "FINISHED"),
            Self::FinishedWithErrors => write!(f, "FINISHED_WITH_ERRORS"),
            Self::Dropped => write!(f, "DROPPED"),
        }
    }
}

/// The processed/errored counter pair for a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCounts {
    /// Records that completed successfully.
    pub processed: u64,
    /// Records that completed with an error.
    pub errored: u64,
}

impl ProgressCounts {
    /// Creates a counter pair with explicit values.
    #[must_use]
    pub const fn new(processed: u64, errored: u64) -> Self {
        Self { processed, errored }
    }

    /// Returns the total number of attempted records (processed + errored).
    #[must_use]
    pub const fn attempted(&self) -> u64 {
        self.processed + self.errored
    }

    /// Increments the counter matching an outcome.
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Success => self.processed += 1,
            RecordOutcome::Error => self.errored += 1,
        }
    }
}

/// Persisted bookkeeping state for a single bulk task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Task identifier, assigned by the submitting system.
    pub task_id: TaskId,
    /// Name of the processing pipeline the task runs on.
    pub pipeline: String,
    /// Current bookkeeping state.
    pub state: TaskState,
    /// Human-readable description of the latest transition.
    pub state_description: String,
    /// Total records the task is expected to produce notifications for.
    ///
    /// Unknown until enumeration completes, then set exactly once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_count: Option<u64>,
    /// Records that completed successfully.
    pub processed_count: u64,
    /// Records that completed with an error.
    pub errored_count: u64,
    /// When the task was submitted.
    pub sent_at: DateTime<Utc>,
    /// When the first record notification was observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskInfo {
    /// Creates a new task in PENDING state.
    #[must_use]
    pub fn new(task_id: TaskId, pipeline: impl Into<String>) -> Self {
        Self {
            task_id,
            pipeline: pipeline.into(),
            state: TaskState::Pending,
            state_description: "task submitted".into(),
            expected_count: None,
            processed_count: 0,
            errored_count: 0,
            sent_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Returns the current counter pair.
    #[must_use]
    pub const fn counts(&self) -> ProgressCounts {
        ProgressCounts {
            processed: self.processed_count,
            errored: self.errored_count,
        }
    }

    /// Returns the total number of attempted records.
    #[must_use]
    pub const fn attempted(&self) -> u64 {
        self.processed_count + self.errored_count
    }

    /// Returns true if the task is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Records the expected count, exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExpectedCountAlreadySet`] if a count was recorded
    /// earlier; the enumerator owns the value and corrections are rejected.
    pub fn set_expected_count(&mut self, expected: u64) -> Result<()> {
        if let Some(existing) = self.expected_count {
            return Err(Error::ExpectedCountAlreadySet {
                task_id: self.task_id,
                existing,
            });
        }
        self.expected_count = Some(expected);
        Ok(())
    }

    /// Applies a record outcome to the counters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExpectedCountExceeded`] if the increment would push
    /// attempted records past the expected count.
    pub fn record_outcome(&mut self, outcome: RecordOutcome) -> Result<ProgressCounts> {
        if let Some(expected) = self.expected_count {
            if self.attempted() >= expected {
                return Err(Error::ExpectedCountExceeded {
                    task_id: self.task_id,
                    expected,
                    attempted: self.attempted() + 1,
                });
            }
        }
        match outcome {
            RecordOutcome::Success => self.processed_count += 1,
            RecordOutcome::Error => self.errored_count += 1,
        }
        Ok(self.counts())
    }

    /// Transitions to a new state.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is invalid.
    #[tracing::instrument(
        skip(self, description),
        fields(task_id = %self.task_id, from = %self.state, to = %target)
    )]
    pub fn transition_to(&mut self, target: TaskState, description: impl Into<String>) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
                reason: format!(
                    "valid transitions from {}: {:?}",
                    self.state,
                    self.state.valid_transitions()
                ),
            });
        }

        let now = Utc::now();
        match target {
            TaskState::Active => {
                self.started_at = Some(now);
            }
            TaskState::Finished | TaskState::FinishedWithErrors | TaskState::Dropped => {
                self.finished_at = Some(now);
            }
            _ => {}
        }

        self.state = target;
        self.state_description = description.into();
        Ok(())
    }

    /// Attempts to transition to a terminal state idempotently.
    ///
    /// Returns `Ok(true)` if the transition was applied.
    /// Returns `Ok(false)` if already in the same terminal state (no-op).
    ///
    /// Late duplicates of the finalizing notification must not re-terminate
    /// the task; this guard makes the terminal write safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is not terminal, or if the task already
    /// sits in a *different* terminal state.
    pub fn try_terminal_transition(
        &mut self,
        target: TaskState,
        description: impl Into<String>,
    ) -> Result<bool> {
        if !target.is_terminal() {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
                reason: "try_terminal_transition requires a terminal state".to_string(),
            });
        }

        if self.state.is_terminal() {
            if self.state == target {
                return Ok(false);
            }
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
                reason: "cannot transition from one terminal state to another".to_string(),
            });
        }

        self.transition_to(target, description)?;
        Ok(true)
    }
}
