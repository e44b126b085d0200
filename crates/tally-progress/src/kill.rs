//! Cooperative cancellation via per-task kill flags.
//!
//! A kill flag is an out-of-band signal set in a coordination store; workers
//! poll it before each unit of work and abort early when it is observed.
//! Notifications already emitted for the task keep flowing through the
//! accumulator, where the terminal (dropped) state absorbs them.
//!
//! Because hot worker loops poll before every record, reads go through
//! [`CachedKillChecker`], which caches negative answers for a freshness TTL
//! and positive answers forever (a kill is never revoked).

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use tally_core::TaskId;

use crate::error::{Error, Result};

/// Default freshness window for cached negative answers.
pub const DEFAULT_KILL_CACHE_TTL: Duration = Duration::from_secs(5);

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

/// Read side of the kill flag store.
#[async_trait]
pub trait KillSwitch: Send + Sync {
    /// Returns true if the kill flag is set for a task.
    async fn is_killed(&self, task_id: TaskId) -> Result<bool>;
}

/// Write side of the kill flag store.
#[async_trait]
pub trait KillRegistry: KillSwitch {
    /// Sets the kill flag for a task with a reason.
    async fn kill(&self, task_id: TaskId, reason: &str) -> Result<()>;
}

/// In-memory kill flag store for testing and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryKillRegistry {
    flags: RwLock<HashMap<TaskId, String>>,
}

impl InMemoryKillRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded kill reason, if the task was killed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn reason(&self, task_id: TaskId) -> Result<Option<String>> {
        let reason = {
            let flags = self.flags.read().map_err(poison_err)?;
            flags.get(&task_id).cloned()
        };
        Ok(reason)
    }
}

#[async_trait]
impl KillSwitch for InMemoryKillRegistry {
    async fn is_killed(&self, task_id: TaskId) -> Result<bool> {
        let killed = {
            let flags = self.flags.read().map_err(poison_err)?;
            flags.contains_key(&task_id)
        };
        Ok(killed)
    }
}

#[async_trait]
impl KillRegistry for InMemoryKillRegistry {
    async fn kill(&self, task_id: TaskId, reason: &str) -> Result<()> {
        {
            let mut flags = self.flags.write().map_err(poison_err)?;
            flags.entry(task_id).or_insert_with(|| reason.to_string());
        }
        tracing::info!(%task_id, reason, "kill flag set");
        Ok(())
    }
}

/// Caching wrapper around a [`KillSwitch`].
///
/// Negative answers are cached for the TTL; positive answers are cached
/// permanently because kill flags are monotonic.
pub struct CachedKillChecker {
    inner: Arc<dyn KillSwitch>,
    ttl: Duration,
    cache: RwLock<HashMap<TaskId, CacheEntry>>,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    killed: bool,
    checked_at: Instant,
}

impl CachedKillChecker {
    /// Wraps a kill switch with the default freshness TTL.
    #[must_use]
    pub fn new(inner: Arc<dyn KillSwitch>) -> Self {
        Self::with_ttl(inner, DEFAULT_KILL_CACHE_TTL)
    }

    /// Wraps a kill switch with an explicit freshness TTL.
    #[must_use]
    pub fn with_ttl(inner: Arc<dyn KillSwitch>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, task_id: TaskId) -> Result<Option<bool>> {
        let entry = {
            let cache = self.cache.read().map_err(poison_err)?;
            cache.get(&task_id).copied()
        };
        Ok(entry.and_then(|e| {
            if e.killed || e.checked_at.elapsed() < self.ttl {
                Some(e.killed)
            } else {
                None
            }
        }))
    }
}

#[async_trait]
impl KillSwitch for CachedKillChecker {
    async fn is_killed(&self, task_id: TaskId) -> Result<bool> {
        if let Some(killed) = self.cached(task_id)? {
            return Ok(killed);
        }

        let killed = self.inner.is_killed(task_id).await?;
        {
            let mut cache = self.cache.write().map_err(poison_err)?;
            cache.insert(
                task_id,
                CacheEntry {
                    killed,
                    checked_at: Instant::now(),
                },
            );
        }
        Ok(killed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSwitch {
        killed: RwLock<bool>,
        reads: AtomicU32,
    }

    #[async_trait]
    impl KillSwitch for CountingSwitch {
        async fn is_killed(&self, _task_id: TaskId) -> Result<bool> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(*self.killed.read().map_err(poison_err)?)
        }
    }

    #[tokio::test]
    async fn registry_sets_and_reports_flags() -> Result<()> {
        let registry = InMemoryKillRegistry::new();
        let task_id = TaskId::new(1);

        assert!(!registry.is_killed(task_id).await?);

        registry.kill(task_id, "dropped by the user").await?;
        assert!(registry.is_killed(task_id).await?);
        assert_eq!(
            registry.reason(task_id)?.as_deref(),
            Some("dropped by the user")
        );

        Ok(())
    }

    #[tokio::test]
    async fn first_kill_reason_wins() -> Result<()> {
        let registry = InMemoryKillRegistry::new();
        let task_id = TaskId::new(1);

        registry.kill(task_id, "first").await?;
        registry.kill(task_id, "second").await?;
        assert_eq!(registry.reason(task_id)?.as_deref(), Some("first"));

        Ok(())
    }

    #[tokio::test]
    async fn checker_caches_negative_answers_within_ttl() -> Result<()> {
        let inner = Arc::new(CountingSwitch {
            killed: RwLock::new(false),
            reads: AtomicU32::new(0),
        });
        let checker = CachedKillChecker::with_ttl(inner.clone(), Duration::from_secs(60));
        let task_id = TaskId::new(1);

        assert!(!checker.is_killed(task_id).await?);
        assert!(!checker.is_killed(task_id).await?);
        assert!(!checker.is_killed(task_id).await?);

        // Only the first read went through to the backing switch
        assert_eq!(inner.reads.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[tokio::test]
    async fn checker_refreshes_after_ttl() -> Result<()> {
        let inner = Arc::new(CountingSwitch {
            killed: RwLock::new(false),
            reads: AtomicU32::new(0),
        });
        let checker = CachedKillChecker::with_ttl(inner.clone(), Duration::ZERO);
        let task_id = TaskId::new(1);

        assert!(!checker.is_killed(task_id).await?);

        // Flag set after the first (now stale) read
        *inner.killed.write().map_err(poison_err)? = true;
        assert!(checker.is_killed(task_id).await?);

        // Positive answers are cached permanently
        *inner.killed.write().map_err(poison_err)? = false;
        assert!(checker.is_killed(task_id).await?);
        assert_eq!(inner.reads.load(Ordering::SeqCst), 2);

        Ok(())
    }
}
