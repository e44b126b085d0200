//! Record workers and the notification drain loop.
//!
//! A fixed-size pool of tokio tasks consumes work items from a shared
//! channel, runs the per-record computation behind [`RecordProcessor`], and
//! forwards one [`Notification`] per record to the accumulator's channel.
//!
//! ## Cancellation
//!
//! Workers poll the kill switch before each unit of work and skip records of
//! killed tasks. Notifications already emitted keep flowing; the task's
//! terminal state absorbs them on the accumulator side.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use tally_core::TaskId;

use crate::accumulator::ProgressAccumulator;
use crate::events::EventSink;
use crate::kill::KillSwitch;
use crate::notification::Notification;

/// One record's worth of work.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// The task the record belongs to.
    pub task_id: TaskId,
    /// Resource reference identifying the record.
    pub record: String,
    /// Set by the enumerator on the last expected record of the task.
    pub is_last: bool,
}

impl WorkItem {
    /// Creates a work item.
    #[must_use]
    pub fn new(task_id: TaskId, record: impl Into<String>) -> Self {
        Self {
            task_id,
            record: record.into(),
            is_last: false,
        }
    }

    /// Flags this item as the last expected record.
    #[must_use]
    pub const fn last(mut self) -> Self {
        self.is_last = true;
        self
    }
}

/// Result of processing a single record.
#[derive(Debug, Clone)]
pub enum RecordResult {
    /// The record was processed successfully.
    Succeeded {
        /// Optional processing note.
        info: Option<String>,
    },
    /// Processing failed.
    Failed {
        /// Diagnostic message.
        error: String,
    },
}

impl RecordResult {
    /// Returns true if the record succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Converts the result into the notification the accumulator consumes.
    #[must_use]
    pub fn into_notification(self, item: &WorkItem) -> Notification {
        let notification = match self {
            Self::Succeeded { info: Some(info) } => {
                Notification::success(item.task_id, item.record.clone()).with_info(info)
            }
            Self::Succeeded { info: None } => {
                Notification::success(item.task_id, item.record.clone())
            }
            Self::Failed { error } => {
                Notification::error(item.task_id, item.record.clone(), error)
            }
        };
        if item.is_last {
            notification.last()
        } else {
            notification
        }
    }
}

/// Trait for the per-record computation.
///
/// Implementations fetch the resource behind the record reference, transform
/// it, and report the outcome. They must be cheap to share across workers.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    /// Processes a record and returns the outcome.
    async fn process(&self, item: &WorkItem) -> RecordResult;
}

/// A processor for testing that immediately succeeds.
#[derive(Debug, Default)]
pub struct NoOpProcessor;

#[async_trait]
impl RecordProcessor for NoOpProcessor {
    async fn process(&self, _item: &WorkItem) -> RecordResult {
        RecordResult::Succeeded { info: None }
    }
}

/// A processor that always fails with a configurable diagnostic.
#[derive(Debug)]
pub struct FailingProcessor {
    error: String,
}

impl FailingProcessor {
    /// Creates a failing processor with the given diagnostic.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[async_trait]
impl RecordProcessor for FailingProcessor {
    async fn process(&self, _item: &WorkItem) -> RecordResult {
        RecordResult::Failed {
            error: self.error.clone(),
        }
    }
}

/// A fixed-size pool of record workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers over a shared work channel.
    ///
    /// Workers exit when the work channel closes and drains, or when the
    /// notification channel's receiver goes away.
    #[must_use]
    pub fn spawn(
        size: usize,
        items: mpsc::Receiver<WorkItem>,
        processor: Arc<dyn RecordProcessor>,
        kills: Arc<dyn KillSwitch>,
        notifications: mpsc::Sender<Notification>,
    ) -> Self {
        let items = Arc::new(Mutex::new(items));
        let handles = (0..size.max(1))
            .map(|worker| {
                let items = Arc::clone(&items);
                let processor = Arc::clone(&processor);
                let kills = Arc::clone(&kills);
                let notifications = notifications.clone();
                tokio::spawn(async move {
                    worker_loop(worker, &items, &*processor, &*kills, &notifications).await;
                })
            })
            .collect();
        Self { handles }
    }

    /// Waits for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(error) = handle.await {
                tracing::error!(%error, "worker panicked");
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    items: &Mutex<mpsc::Receiver<WorkItem>>,
    processor: &dyn RecordProcessor,
    kills: &dyn KillSwitch,
    notifications: &mpsc::Sender<Notification>,
) {
    loop {
        let item = {
            let mut receiver = items.lock().await;
            receiver.recv().await
        };
        let Some(item) = item else {
            break;
        };

        // Cooperative cancellation: poll the flag before each unit of work.
        match kills.is_killed(item.task_id).await {
            Ok(true) => {
                tracing::info!(worker, task_id = %item.task_id, record = %item.record,
                    "kill flag observed, skipping record");
                continue;
            }
            Ok(false) => {}
            Err(error) => {
                // An unreadable flag must not stall the pipeline.
                tracing::warn!(worker, task_id = %item.task_id, %error,
                    "kill flag check failed, continuing");
            }
        }

        let result = processor.process(&item).await;
        let notification = result.into_notification(&item);
        if notifications.send(notification).await.is_err() {
            tracing::debug!(worker, "notification channel closed, stopping");
            break;
        }
    }
}

/// Drains a notification channel into the accumulator.
///
/// Store failures past the retry budget are logged and skipped; the affected
/// task stays in its last persisted state while the loop keeps serving other
/// tasks.
pub async fn drain_notifications(
    accumulator: &mut ProgressAccumulator,
    notifications: &mut mpsc::Receiver<Notification>,
    sink: &mut dyn EventSink,
) {
    while let Some(notification) = notifications.recv().await {
        if let Err(error) = accumulator.handle(&notification, sink).await {
            tracing::error!(
                task_id = %notification.task_id,
                record = %notification.record,
                %error,
                "failed to apply notification, task left in last persisted state"
            );
        }
    }
}
