//! # tally-progress
//!
//! Progress bookkeeping for bulk tasks decomposed into many individually
//! processed records.
//!
//! This crate implements the bookkeeping domain, providing:
//!
//! - **State Machine**: Monotonic task lifecycle with guarded terminal states
//! - **Progress Accumulator**: Per-record notifications folded into per-task
//!   counters, with crash-recoverable caching
//! - **Cooperative Cancellation**: Kill flags polled by workers, with a
//!   distinct DROPPED terminal state
//! - **Bounded Retries**: Fixed-backoff absorption of transient store faults
//!
//! ## Core Concepts
//!
//! - **Task**: a bulk unit of work decomposed into many records, tracked by
//!   counters (processed, errored, expected total)
//! - **Notification**: a per-record outcome signal emitted by workers
//! - **Kill flag**: an out-of-band cancellation signal checked cooperatively
//!
//! ## Guarantees
//!
//! - **Monotonic**: no task state reverts once terminal
//! - **Idempotent**: replayed notifications and duplicate finalizations are
//!   absorbed without double counting
//! - **Recoverable**: counters resume from the store after a restart
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tally_core::TaskId;
//! use tally_progress::accumulator::{AccumulatorConfig, ProgressAccumulator};
//! use tally_progress::error::Result;
//! use tally_progress::events::InMemoryOutbox;
//! use tally_progress::kill::InMemoryKillRegistry;
//! use tally_progress::notification::Notification;
//! use tally_progress::retry::RetryPolicy;
//! use tally_progress::store::memory::InMemoryProgressStore;
//! use tally_progress::submitter::TaskSubmitter;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let store = Arc::new(InMemoryProgressStore::new());
//! let kills = Arc::new(InMemoryKillRegistry::new());
//! let mut outbox = InMemoryOutbox::new();
//!
//! // Submit a task and record its enumeration outcome.
//! let submitter = TaskSubmitter::new(store.clone(), kills, RetryPolicy::default());
//! let task_id = TaskId::new(42);
//! submitter.submit(task_id, "harvest", &mut outbox).await?;
//! submitter.complete_enumeration(task_id, 1, &mut outbox).await?;
//!
//! // Fold notifications into task state.
//! let mut accumulator = ProgressAccumulator::new(
//!     store.clone(),
//!     store.clone(),
//!     store.clone(),
//!     AccumulatorConfig::default(),
//! );
//! accumulator
//!     .handle(&Notification::success(task_id, "record-1").last(), &mut outbox)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod accumulator;
pub mod error;
pub mod events;
pub mod kill;
pub mod metrics;
pub mod notification;
pub mod records;
pub mod report;
pub mod retry;
pub mod store;
pub mod submitter;
pub mod task;
pub mod worker;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::accumulator::{AccumulatorConfig, Disposition, ProgressAccumulator};
    pub use crate::error::{Error, Result};
    pub use crate::events::{EventSink, InMemoryOutbox, TaskEvent, TaskEventData};
    pub use crate::kill::{CachedKillChecker, InMemoryKillRegistry, KillRegistry, KillSwitch};
    pub use crate::metrics::ProgressMetrics;
    pub use crate::notification::{Notification, RecordOutcome};
    pub use crate::records::{ProcessedRecord, RecordState};
    pub use crate::report::{ErrorGroup, ErrorSample, TaskErrorReport};
    pub use crate::retry::{retry, RetryPolicy};
    pub use crate::store::{ErrorLog, RecordLog, TaskStore};
    pub use crate::submitter::TaskSubmitter;
    pub use crate::task::{ProgressCounts, TaskInfo, TaskState};
    pub use crate::worker::{
        drain_notifications, RecordProcessor, RecordResult, WorkItem, WorkerPool,
    };
}
