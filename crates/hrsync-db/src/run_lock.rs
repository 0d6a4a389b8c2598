//! PostgreSQL run lock.
//!
//! The lock is a row in `run_locks`, so it does not depend on which pooled
//! connection takes or releases it. A row older than the stale timeout is
//! taken over by the next run.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use hrsync_reconcile::{RunLock, SyncResult};

use crate::error::DbError;
use crate::models::RunLockRow;
use crate::pool::DbPool;

/// Default age after which a held lock is considered abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

/// [`RunLock`] backed by the `run_locks` table.
#[derive(Debug, Clone)]
pub struct PgRunLock {
    pool: DbPool,
    stale_after: Duration,
}

impl PgRunLock {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Current holder, if the lock is held.
    pub async fn holder(&self, name: &str) -> Result<Option<String>, DbError> {
        let row = RunLockRow::get(self.pool.inner(), name).await?;
        Ok(row.map(|r| r.holder))
    }
}

#[async_trait]
impl RunLock for PgRunLock {
    async fn try_acquire(&self, name: &str, holder: &str) -> SyncResult<bool> {
        let row = RunLockRow::try_acquire(
            self.pool.inner(),
            name,
            holder,
            self.stale_after.as_secs_f64(),
        )
        .await
        .map_err(DbError::from)?;
        let acquired = row.is_some();
        debug!(lock = name, holder = holder, acquired, "Run lock");
        Ok(acquired)
    }

    async fn release(&self, name: &str, holder: &str) -> SyncResult<()> {
        let released = RunLockRow::release(self.pool.inner(), name, holder)
            .await
            .map_err(DbError::from)?;
        if !released {
            warn!(lock = name, holder = holder, "Run lock was not held by this holder");
        }
        Ok(())
    }
}
