//! Task type and task rows.
//!
//! Triples are stored as three upper-case columns on both tables so that
//! task listings never need a join.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use hrsync_tasks::{Task, TaskFilter, TaskStatistics, TaskStatus, TaskTriple, TaskType};

use crate::error::{DbError, DbResult};

fn parse_triple(target: &str, object: &str, action: &str) -> DbResult<TaskTriple> {
    Ok(TaskTriple::new(
        target.parse().map_err(DbError::ValidationFailed)?,
        object.parse().map_err(DbError::ValidationFailed)?,
        action.parse().map_err(DbError::ValidationFailed)?,
    ))
}

/// A row of `task_types`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskTypeRow {
    pub id: Uuid,
    pub target: String,
    pub object: String,
    pub action: String,
    pub name: String,
    pub dispatch_name: String,
    pub priority: i32,
    pub auto_process: bool,
    pub requires_confirmation: bool,
    pub description: Option<String>,
    pub is_active: bool,
}

impl TaskTypeRow {
    pub fn into_task_type(self) -> DbResult<TaskType> {
        Ok(TaskType {
            id: self.id.into(),
            triple: parse_triple(&self.target, &self.object, &self.action)?,
            name: self.name,
            dispatch_name: self.dispatch_name,
            priority: self.priority,
            auto_process: self.auto_process,
            requires_confirmation: self.requires_confirmation,
            description: self.description,
            is_active: self.is_active,
        })
    }

    pub async fn find_by_triple<'e, E>(
        executor: E,
        triple: &TaskTriple,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, target, object, action, name, dispatch_name, priority, auto_process,
                   requires_confirmation, description, is_active
            FROM task_types
            WHERE target = $1 AND object = $2 AND action = $3
            ",
        )
        .bind(triple.target.as_str())
        .bind(triple.object.as_str())
        .bind(triple.action.as_str())
        .fetch_optional(executor)
        .await
    }

    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, target, object, action, name, dispatch_name, priority, auto_process,
                   requires_confirmation, description, is_active
            FROM task_types
            ORDER BY priority, name
            ",
        )
        .fetch_all(executor)
        .await
    }

    pub async fn insert<'e, E>(executor: E, task_type: &TaskType) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO task_types
                (id, target, object, action, name, dispatch_name, priority, auto_process,
                 requires_confirmation, description, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(Uuid::from(task_type.id))
        .bind(task_type.triple.target.as_str())
        .bind(task_type.triple.object.as_str())
        .bind(task_type.triple.action.as_str())
        .bind(&task_type.name)
        .bind(&task_type.dispatch_name)
        .bind(task_type.priority)
        .bind(task_type.auto_process)
        .bind(task_type.requires_confirmation)
        .bind(&task_type.description)
        .bind(task_type.is_active)
        .execute(executor)
        .await?;
        Ok(())
    }
}

/// A row of `tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub type_id: Uuid,
    pub target: String,
    pub object: String,
    pub action: String,
    pub name: String,
    pub data: JsonValue,
    pub data2: Option<JsonValue>,
    pub status: String,
    pub auto_sync: bool,
    pub dedup_key: String,
    pub last_run: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_finished_at: Option<DateTime<Utc>>,
    pub error_description: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn into_task(self) -> DbResult<Task> {
        let status: TaskStatus = self.status.parse().map_err(DbError::ValidationFailed)?;
        Ok(Task {
            id: self.id.into(),
            type_id: self.type_id.into(),
            triple: parse_triple(&self.target, &self.object, &self.action)?,
            name: self.name,
            data: self.data,
            data2: self.data2,
            status,
            auto_sync: self.auto_sync,
            dedup_key: self.dedup_key,
            last_run: self.last_run,
            processing_started_at: self.processing_started_at,
            processing_finished_at: self.processing_finished_at,
            error_description: self.error_description,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            archived: self.archived,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    pub async fn get_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, type_id, target, object, action, name, data, data2, status, auto_sync,
                   dedup_key, last_run, processing_started_at, processing_finished_at,
                   error_description, retry_count, max_retries, archived, created_at, updated_at
            FROM tasks
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// The open (`new` or `processing`, not archived) task with a dedup key.
    pub async fn find_open_by_dedup<'e, E>(
        executor: E,
        dedup_key: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, type_id, target, object, action, name, data, data2, status, auto_sync,
                   dedup_key, last_run, processing_started_at, processing_finished_at,
                   error_description, retry_count, max_retries, archived, created_at, updated_at
            FROM tasks
            WHERE dedup_key = $1 AND status IN ('new', 'processing') AND NOT archived
            ",
        )
        .bind(dedup_key)
        .fetch_optional(executor)
        .await
    }

    /// Tasks matching a filter, oldest first.
    pub async fn list<'e, E>(executor: E, filter: &TaskFilter) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if !filter.include_archived {
            conditions.push("NOT archived".to_string());
        }
        if filter.type_id.is_some() {
            conditions.push(format!("type_id = ${param_idx}"));
            param_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${param_idx}"));
            param_idx += 1;
        }

        let mut query = String::from(
            r"
            SELECT id, type_id, target, object, action, name, data, data2, status, auto_sync,
                   dedup_key, last_run, processing_started_at, processing_finished_at,
                   error_description, retry_count, max_retries, archived, created_at, updated_at
            FROM tasks
            ",
        );
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY created_at, id");
        if filter.limit.is_some() {
            query.push_str(&format!(" LIMIT ${param_idx}"));
        }

        let mut q = sqlx::query_as::<_, Self>(&query);
        if let Some(type_id) = filter.type_id {
            q = q.bind(Uuid::from(type_id));
        }
        if let Some(status) = filter.status {
            q = q.bind(status.to_string());
        }
        if let Some(limit) = filter.limit {
            q = q.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        q.fetch_all(executor).await
    }

    pub async fn insert<'e, E>(executor: E, task: &Task) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO tasks
                (id, type_id, target, object, action, name, data, data2, status, auto_sync,
                 dedup_key, last_run, processing_started_at, processing_finished_at,
                 error_description, retry_count, max_retries, archived, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ",
        )
        .bind(Uuid::from(task.id))
        .bind(Uuid::from(task.type_id))
        .bind(task.triple.target.as_str())
        .bind(task.triple.object.as_str())
        .bind(task.triple.action.as_str())
        .bind(&task.name)
        .bind(&task.data)
        .bind(&task.data2)
        .bind(task.status.to_string())
        .bind(task.auto_sync)
        .bind(&task.dedup_key)
        .bind(task.last_run)
        .bind(task.processing_started_at)
        .bind(task.processing_finished_at)
        .bind(&task.error_description)
        .bind(task.retry_count)
        .bind(task.max_retries)
        .bind(task.archived)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Compare-and-set write: only lands while the stored status is `expected`.
    pub async fn update_if_status<'e, E>(
        executor: E,
        task: &Task,
        expected: TaskStatus,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE tasks
            SET data = $3, data2 = $4, status = $5, auto_sync = $6, last_run = $7,
                processing_started_at = $8, processing_finished_at = $9,
                error_description = $10, retry_count = $11, max_retries = $12,
                archived = $13, updated_at = $14
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(Uuid::from(task.id))
        .bind(expected.to_string())
        .bind(&task.data)
        .bind(&task.data2)
        .bind(task.status.to_string())
        .bind(task.auto_sync)
        .bind(task.last_run)
        .bind(task.processing_started_at)
        .bind(task.processing_finished_at)
        .bind(&task.error_description)
        .bind(task.retry_count)
        .bind(task.max_retries)
        .bind(task.archived)
        .bind(task.updated_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn statistics<'e, E>(executor: E) -> Result<TaskStatistics, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r"
            SELECT
                COUNT(*) FILTER (WHERE NOT archived AND status = 'new'),
                COUNT(*) FILTER (WHERE NOT archived AND status = 'processing'),
                COUNT(*) FILTER (WHERE NOT archived AND status = 'completed_ok'),
                COUNT(*) FILTER (WHERE NOT archived AND status = 'error'),
                COUNT(*) FILTER (WHERE NOT archived AND status = 'error'
                                 AND retry_count >= max_retries),
                COUNT(*) FILTER (WHERE archived),
                COUNT(*) FILTER (WHERE NOT archived AND status = 'new'
                                 AND (action = 'MANUAL' OR target IN ('MANUAL', 'SYSTEM')))
            FROM tasks
            ",
        )
        .fetch_one(executor)
        .await?;

        let count = |n: i64| u64::try_from(n).unwrap_or(0);
        Ok(TaskStatistics {
            new: count(row.0),
            processing: count(row.1),
            completed_ok: count(row.2),
            error: count(row.3),
            exhausted: count(row.4),
            archived: count(row.5),
            manual_pending: count(row.6),
        })
    }
}
