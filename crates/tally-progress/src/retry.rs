//! Bounded retry with fixed backoff for store operations.
//!
//! Transient backend failures (connection blips, overloaded nodes) are
//! absorbed by retrying a bounded number of times with a fixed delay between
//! attempts. Permanent domain errors are returned immediately. Exhaustion
//! surfaces the last error to the caller; the task is then left in its last
//! successfully persisted state rather than crashing the process.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::record_retry;

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Default fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Retry policy: bounded attempts with a fixed delay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    #[serde(with = "humantime_serde", default = "default_delay")]
    pub delay: Duration,
}

const fn default_delay() -> Duration {
    DEFAULT_RETRY_DELAY
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit attempts and delay.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single-attempt policy (no retries).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Runs an async store operation under a retry policy.
///
/// Only transient errors ([`crate::error::Error::is_transient`]) consume the
/// attempt budget; permanent errors return immediately. Each retried attempt
/// is logged at warn level with the remaining budget and counted in
/// `tally_retries_total`; the final failure is logged at error level and
/// returned to the caller.
///
/// # Errors
///
/// Returns the last error once the attempt budget is exhausted, or the first
/// permanent error encountered.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < max_attempts => {
                let remaining = max_attempts - attempt;
                tracing::warn!(operation, %error, attempt, remaining, "retrying after failure");
                record_retry(operation);
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(error) => {
                if error.is_transient() {
                    tracing::error!(operation, %error, attempts = max_attempts, "retry budget exhausted");
                }
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tally_core::TaskId;

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_first_try_without_retrying() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry(&quick_policy(3), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_absorbed() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry(&quick_policy(3), "op", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(Error::storage("transient"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32> = retry(&quick_policy(3), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::storage("still down"))
        })
        .await;

        assert!(matches!(result, Err(Error::Storage { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_short_circuit() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32> = retry(&quick_policy(5), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::TaskNotFound {
                task_id: TaskId::new(404),
            })
        })
        .await;

        assert!(matches!(result, Err(Error::TaskNotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry(&quick_policy(0), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
