//! Run-level mutual exclusion.
//!
//! Only one sync run may work on the queue and the identity store at a time.
//! A run that cannot take the lock refuses to start; it never waits.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::SyncResult;

/// Name of the lock guarding full and differential sync runs.
pub const SYNC_LOCK: &str = "hrsync-sync";

/// Non-blocking named lock.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// Returns `Ok(true)` when acquired, `Ok(false)` when held elsewhere.
    async fn try_acquire(&self, name: &str, holder: &str) -> SyncResult<bool>;

    /// Release a lock taken by `holder`. Releasing a lock that is not held is
    /// not an error.
    async fn release(&self, name: &str, holder: &str) -> SyncResult<()>;
}

/// Process-local lock.
#[derive(Debug, Default)]
pub struct InMemoryRunLock {
    held: AtomicBool,
}

impl InMemoryRunLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunLock for InMemoryRunLock {
    async fn try_acquire(&self, name: &str, holder: &str) -> SyncResult<bool> {
        let acquired = self
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        debug!(lock = name, holder = holder, acquired, "Run lock");
        Ok(acquired)
    }

    async fn release(&self, name: &str, holder: &str) -> SyncResult<()> {
        self.held.store(false, Ordering::SeqCst);
        debug!(lock = name, holder = holder, "Run lock released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_is_refused() {
        let lock = InMemoryRunLock::new();
        assert!(lock.try_acquire(SYNC_LOCK, "a").await.unwrap());
        assert!(!lock.try_acquire(SYNC_LOCK, "b").await.unwrap());

        lock.release(SYNC_LOCK, "a").await.unwrap();
        assert!(!lock.is_held());
        assert!(lock.try_acquire(SYNC_LOCK, "b").await.unwrap());
    }
}
