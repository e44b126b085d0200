//! Observability infrastructure for Tally.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors for consistent observability
//! across all Tally components.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `tally_progress=debug`)
///
/// # Example
///
/// ```rust
/// use tally_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for progress-bookkeeping operations.
///
/// # Example
///
/// ```rust
/// use tally_core::observability::progress_span;
///
/// let span = progress_span("handle_notification", 42);
/// let _guard = span.enter();
/// // ... do bookkeeping operation
/// ```
#[must_use]
pub fn progress_span(operation: &str, task_id: i64) -> Span {
    tracing::info_span!(
        "progress",
        op = operation,
        task_id = task_id,
    )
}

/// Creates a span for worker operations.
///
/// # Example
///
/// ```rust
/// use tally_core::observability::worker_span;
///
/// let span = worker_span(3, 42);
/// let _guard = span.enter();
/// // ... process a record
/// ```
#[must_use]
pub fn worker_span(worker: usize, task_id: i64) -> Span {
    tracing::info_span!(
        "worker",
        worker = worker,
        task_id = task_id,
    )
}
