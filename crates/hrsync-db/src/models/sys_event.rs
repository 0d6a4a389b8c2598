//! System event rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use hrsync_events::{EventSeverity, SysEvent};

use crate::error::{DbError, DbResult};

/// A row of `sys_events`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SysEventRow {
    pub id: Uuid,
    pub code: String,
    pub message: String,
    pub severity: String,
    pub source: String,
    pub occurred_at: DateTime<Utc>,
}

impl SysEventRow {
    pub fn into_event(self) -> DbResult<SysEvent> {
        let severity: EventSeverity = self.severity.parse().map_err(DbError::ValidationFailed)?;
        Ok(SysEvent {
            id: self.id.into(),
            code: self.code,
            message: self.message,
            severity,
            source: self.source,
            occurred_at: self.occurred_at,
        })
    }

    pub async fn insert<'e, E>(executor: E, event: &SysEvent) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO sys_events (id, code, message, severity, source, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(Uuid::from(event.id))
        .bind(&event.code)
        .bind(&event.message)
        .bind(event.severity.to_string())
        .bind(&event.source)
        .bind(event.occurred_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Most recent events with a code, newest first.
    pub async fn list_by_code<'e, E>(
        executor: E,
        code: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, code, message, severity, source, occurred_at
            FROM sys_events
            WHERE code = $1
            ORDER BY occurred_at DESC
            LIMIT $2
            ",
        )
        .bind(code)
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}
