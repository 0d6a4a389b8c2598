//! Reference directory rows: organizations, roles and periods.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use hrsync_core::{Org, Period, Role};

/// A row of `orgs`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrgRow {
    pub id: Uuid,
    pub name: String,
    pub inst_nr: String,
    pub org_type: Option<String>,
    pub parent_id: Option<Uuid>,
    pub is_administrative: bool,
    pub is_active: bool,
    pub import_source: bool,
}

impl From<OrgRow> for Org {
    fn from(row: OrgRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            inst_nr: row.inst_nr,
            org_type: row.org_type,
            is_administrative: row.is_administrative,
            is_active: row.is_active,
            import_source: row.import_source,
        }
    }
}

impl OrgRow {
    /// Distinct institution numbers of active, imported organizations.
    pub async fn import_institutions<'e, E>(executor: E) -> Result<Vec<String>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT DISTINCT inst_nr
            FROM orgs
            WHERE is_active AND import_source
            ORDER BY inst_nr
            ",
        )
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(inst_nr,)| inst_nr).collect())
    }

    pub async fn list_by_institution<'e, E>(
        executor: E,
        inst_nr: &str,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, name, inst_nr, org_type, parent_id, is_administrative, is_active,
                   import_source
            FROM orgs
            WHERE inst_nr = $1 AND is_active
            ORDER BY name
            ",
        )
        .bind(inst_nr)
        .fetch_all(executor)
        .await
    }

    pub async fn parent_of<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT p.id, p.name, p.inst_nr, p.org_type, p.parent_id, p.is_administrative,
                   p.is_active, p.import_source
            FROM orgs c
            JOIN orgs p ON p.id = c.parent_id
            WHERE c.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}

/// A row of `roles`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleRow {
    pub id: Uuid,
    pub name: String,
    pub shortname: String,
    pub is_active: bool,
    pub automatic_sync: bool,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            shortname: row.shortname,
            is_active: row.is_active,
            automatic_sync: row.automatic_sync,
        }
    }
}

impl RoleRow {
    pub async fn find_by_shortname<'e, E>(
        executor: E,
        shortname: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, name, shortname, is_active, automatic_sync
            FROM roles
            WHERE shortname = $1
            ",
        )
        .bind(shortname)
        .fetch_optional(executor)
        .await
    }

    /// Backend role mapped from a canonical role.
    pub async fn backend_for<'e, E>(executor: E, role_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT r.id, r.name, r.shortname, r.is_active, r.automatic_sync
            FROM role_mappings m
            JOIN roles r ON r.id = m.backend_role_id
            WHERE m.role_id = $1
            ",
        )
        .bind(role_id)
        .fetch_optional(executor)
        .await
    }

    /// Backend role mapped onto an organization.
    pub async fn for_org<'e, E>(executor: E, org_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT r.id, r.name, r.shortname, r.is_active, r.automatic_sync
            FROM org_roles o
            JOIN roles r ON r.id = o.role_id
            WHERE o.org_id = $1
            ",
        )
        .bind(org_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn insert<'e, E>(executor: E, role: &Role) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO roles (id, name, shortname, is_active, automatic_sync)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(Uuid::from(role.id))
        .bind(&role.name)
        .bind(&role.shortname)
        .bind(role.is_active)
        .bind(role.automatic_sync)
        .execute(executor)
        .await?;
        Ok(())
    }
}

/// A row of `periods`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PeriodRow {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}

impl From<PeriodRow> for Period {
    fn from(row: PeriodRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            is_active: row.is_active,
        }
    }
}

impl PeriodRow {
    /// The active period with the latest start date.
    pub async fn current<'e, E>(executor: E) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, name, is_active
            FROM periods
            WHERE is_active
            ORDER BY start_date DESC NULLS LAST, name DESC
            LIMIT 1
            ",
        )
        .fetch_optional(executor)
        .await
    }
}
