//! Named run lock rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// A row of `run_locks`. A row exists only while the lock is held.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RunLockRow {
    pub name: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

impl RunLockRow {
    /// Take the lock, or take it over when the current holder is older than
    /// `stale_after_secs`. Returns `None` when someone else holds it.
    pub async fn try_acquire<'e, E>(
        executor: E,
        name: &str,
        holder: &str,
        stale_after_secs: f64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO run_locks (name, holder, acquired_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE
                SET holder = EXCLUDED.holder, acquired_at = EXCLUDED.acquired_at
                WHERE run_locks.acquired_at < NOW() - make_interval(secs => $3)
            RETURNING name, holder, acquired_at
            ",
        )
        .bind(name)
        .bind(holder)
        .bind(stale_after_secs)
        .fetch_optional(executor)
        .await
    }

    /// Drop the lock if `holder` owns it. Returns whether a row was removed.
    pub async fn release<'e, E>(executor: E, name: &str, holder: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM run_locks WHERE name = $1 AND holder = $2")
            .bind(name)
            .bind(holder)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get<'e, E>(executor: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            "SELECT name, holder, acquired_at FROM run_locks WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(executor)
        .await
    }
}
