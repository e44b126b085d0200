//! Task intake and external control.
//!
//! The submitter owns the two edges of the task lifecycle that do not flow
//! through the accumulator:
//!
//! - **Intake**: inserting the task row when a task is submitted, and
//!   recording the expected record count once enumeration completes. A task
//!   whose enumeration matched no records is dropped on the spot ("task was
//!   empty") and never reaches the accumulator.
//! - **Cancellation**: setting the kill flag workers poll, and writing the
//!   terminal DROPPED state.

use std::sync::Arc;

use tally_core::TaskId;

use crate::error::Result;
use crate::events::{EventSink, TaskEvent, TaskEventData};
use crate::kill::KillRegistry;
use crate::metrics::ProgressMetrics;
use crate::retry::{retry, RetryPolicy};
use crate::store::TaskStore;
use crate::task::{TaskInfo, TaskState};

/// Submits tasks and applies external control operations.
pub struct TaskSubmitter {
    tasks: Arc<dyn TaskStore>,
    kills: Arc<dyn KillRegistry>,
    retry: RetryPolicy,
    metrics: ProgressMetrics,
}

impl TaskSubmitter {
    /// Creates a submitter over the given store and kill registry.
    #[must_use]
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        kills: Arc<dyn KillRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            tasks,
            kills,
            retry,
            metrics: ProgressMetrics::new(),
        }
    }

    /// Inserts a new task in PENDING state.
    ///
    /// # Errors
    ///
    /// Returns an error when the insert fails past the retry budget.
    #[tracing::instrument(skip(self, pipeline, sink), fields(task_id = %task_id))]
    pub async fn submit(
        &self,
        task_id: TaskId,
        pipeline: impl Into<String> + Send,
        sink: &mut dyn EventSink,
    ) -> Result<TaskInfo> {
        let task = TaskInfo::new(task_id, pipeline);
        let tasks = Arc::clone(&self.tasks);
        let task_ref = &task;
        retry(&self.retry, "insert_task", || {
            let tasks = Arc::clone(&tasks);
            async move { tasks.insert_task(task_ref).await }
        })
        .await?;

        sink.push(TaskEvent::new(TaskEventData::TaskSubmitted {
            task_id,
            pipeline: task.pipeline.clone(),
        }));
        Ok(task)
    }

    /// Records the outcome of record enumeration.
    ///
    /// An expected count of zero drops the task immediately ("task was
    /// empty"); otherwise the count is recorded (exactly once) and the task
    /// moves to QUEUED. Returns the resulting state.
    ///
    /// # Errors
    ///
    /// Returns an error when the task does not exist, the expected count was
    /// already recorded, or a store write fails past the retry budget.
    #[tracing::instrument(skip(self, sink), fields(task_id = %task_id, expected))]
    pub async fn complete_enumeration(
        &self,
        task_id: TaskId,
        expected: u64,
        sink: &mut dyn EventSink,
    ) -> Result<TaskState> {
        if expected == 0 {
            tracing::info!(%task_id, "no records matched selection criteria");
            self.mark_dropped(task_id, "task was empty", sink).await?;
            return Ok(TaskState::Dropped);
        }

        let tasks = Arc::clone(&self.tasks);
        retry(&self.retry, "set_expected_count", || {
            let tasks = Arc::clone(&tasks);
            async move { tasks.set_expected_count(task_id, expected).await }
        })
        .await?;
        let tasks = Arc::clone(&self.tasks);
        retry(&self.retry, "update_state", || {
            let tasks = Arc::clone(&tasks);
            async move {
                tasks
                    .update_state(task_id, TaskState::Queued, "records enqueued")
                    .await
            }
        })
        .await?;

        self.metrics.record_task_transition(
            TaskState::Pending.as_label(),
            TaskState::Queued.as_label(),
        );
        sink.push(TaskEvent::new(TaskEventData::TaskQueued {
            task_id,
            expected_count: expected,
        }));
        Ok(TaskState::Queued)
    }

    /// Kills a task: sets the kill flag and drops the task.
    ///
    /// Workers observe the flag cooperatively and stop processing; the
    /// terminal DROPPED state absorbs notifications already in flight.
    /// Returns true if the drop was applied, false if the task had already
    /// reached a terminal state (a kill racing with completion never
    /// reverts it).
    ///
    /// # Errors
    ///
    /// Returns an error when the task does not exist or a store write fails
    /// past the retry budget.
    #[tracing::instrument(skip(self, sink), fields(task_id = %task_id, reason))]
    pub async fn kill(
        &self,
        task_id: TaskId,
        reason: &str,
        sink: &mut dyn EventSink,
    ) -> Result<bool> {
        self.kills.kill(task_id, reason).await?;
        self.mark_dropped(task_id, reason, sink).await
    }

    async fn mark_dropped(
        &self,
        task_id: TaskId,
        reason: &str,
        sink: &mut dyn EventSink,
    ) -> Result<bool> {
        let tasks = Arc::clone(&self.tasks);
        let applied = retry(&self.retry, "drop_task", || {
            let tasks = Arc::clone(&tasks);
            async move { tasks.drop_task(task_id, reason).await }
        })
        .await?;

        if applied {
            self.metrics
                .record_task_transition("live", TaskState::Dropped.as_label());
            sink.push(TaskEvent::new(TaskEventData::TaskDropped {
                task_id,
                reason: reason.to_string(),
            }));
        } else {
            tracing::debug!(%task_id, "drop requested for an already terminal task");
        }
        Ok(applied)
    }
}
