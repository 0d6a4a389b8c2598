//! PostgreSQL event sink.

use async_trait::async_trait;

use hrsync_events::{EventError, EventSink, SysEvent};

use crate::error::{DbError, DbResult};
use crate::models::SysEventRow;
use crate::pool::DbPool;

/// Persists events to `sys_events`.
#[derive(Debug, Clone)]
pub struct PgEventSink {
    pool: DbPool,
}

impl PgEventSink {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Latest events with a code, newest first.
    pub async fn recent(&self, code: &str, limit: i64) -> DbResult<Vec<SysEvent>> {
        let rows = SysEventRow::list_by_code(self.pool.inner(), code, limit).await?;
        rows.into_iter().map(SysEventRow::into_event).collect()
    }
}

#[async_trait]
impl EventSink for PgEventSink {
    async fn write(&self, event: &SysEvent) -> Result<(), EventError> {
        SysEventRow::insert(self.pool.inner(), event)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
