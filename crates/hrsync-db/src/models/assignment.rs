//! Role assignment edge rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use hrsync_core::RoleAssignment;

/// A row of `role_assignments`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleAssignmentRow {
    pub id: Uuid,
    pub person_id: Uuid,
    pub org_id: Option<Uuid>,
    pub role_id: Uuid,
    pub period_id: Option<Uuid>,
    pub institution: Option<String>,
    pub is_active: bool,
    pub automatic_sync: bool,
    pub source: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleAssignmentRow> for RoleAssignment {
    fn from(row: RoleAssignmentRow) -> Self {
        Self {
            id: row.id.into(),
            person_id: row.person_id.into(),
            org_id: row.org_id.map(Into::into),
            role_id: row.role_id.into(),
            period_id: row.period_id.map(Into::into),
            institution: row.institution,
            is_active: row.is_active,
            automatic_sync: row.automatic_sync,
            source: row.source,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl RoleAssignmentRow {
    pub async fn get_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, person_id, org_id, role_id, period_id, institution, is_active,
                   automatic_sync, source, created_at, updated_at
            FROM role_assignments
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Active edges of a person, oldest first.
    pub async fn list_active_for_person<'e, E>(
        executor: E,
        person_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, person_id, org_id, role_id, period_id, institution, is_active,
                   automatic_sync, source, created_at, updated_at
            FROM role_assignments
            WHERE person_id = $1 AND is_active
            ORDER BY created_at
            ",
        )
        .bind(person_id)
        .fetch_all(executor)
        .await
    }

    pub async fn insert<'e, E>(executor: E, edge: &RoleAssignment) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO role_assignments
                (id, person_id, org_id, role_id, period_id, institution, is_active,
                 automatic_sync, source, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(Uuid::from(edge.id))
        .bind(Uuid::from(edge.person_id))
        .bind(edge.org_id.map(Uuid::from))
        .bind(Uuid::from(edge.role_id))
        .bind(edge.period_id.map(Uuid::from))
        .bind(&edge.institution)
        .bind(edge.is_active)
        .bind(edge.automatic_sync)
        .bind(&edge.source)
        .bind(edge.created_at)
        .bind(edge.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Returns `false` if the edge does not exist.
    pub async fn deactivate<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE role_assignments
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deactivate every active edge of a person. Returns the number changed.
    pub async fn deactivate_for_person<'e, E>(executor: E, person_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE role_assignments
            SET is_active = FALSE, updated_at = NOW()
            WHERE person_id = $1 AND is_active
            ",
        )
        .bind(person_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
