//! PostgreSQL task store.
//!
//! Open-task dedup is enforced by the partial unique index on
//! `tasks.dedup_key`; status changes are compare-and-set on the stored
//! status, so two workers can never both claim a task.

use async_trait::async_trait;
use uuid::Uuid;

use hrsync_core::TaskId;
use hrsync_tasks::{
    Task, TaskError, TaskFilter, TaskResult, TaskStatistics, TaskStatus, TaskStore, TaskTriple,
    TaskType,
};

use crate::error::{DbError, DbResult};
use crate::models::{TaskRow, TaskTypeRow};
use crate::pool::DbPool;

/// [`TaskStore`] backed by the `task_types` and `tasks` tables.
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn tasks(rows: Vec<TaskRow>) -> DbResult<Vec<Task>> {
    rows.into_iter().map(TaskRow::into_task).collect()
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn find_type(&self, triple: &TaskTriple) -> TaskResult<Option<TaskType>> {
        let row = TaskTypeRow::find_by_triple(self.pool.inner(), triple)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(TaskTypeRow::into_task_type).transpose()?)
    }

    async fn insert_type(&self, task_type: &TaskType) -> TaskResult<()> {
        match TaskTypeRow::insert(self.pool.inner(), task_type).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = DbError::from(e);
                if err.is_unique_violation() {
                    Err(TaskError::DuplicateType {
                        name: task_type.name.clone(),
                    })
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn list_types(&self) -> TaskResult<Vec<TaskType>> {
        let rows = TaskTypeRow::list(self.pool.inner())
            .await
            .map_err(DbError::from)?;
        let mut types = rows
            .into_iter()
            .map(TaskTypeRow::into_task_type)
            .collect::<DbResult<Vec<_>>>()?;
        types.sort_by(|a, b| a.processing_order().cmp(&b.processing_order()));
        Ok(types)
    }

    async fn insert_task(&self, task: &Task) -> TaskResult<()> {
        match TaskRow::insert(self.pool.inner(), task).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = DbError::from(e);
                if err.is_unique_violation() {
                    Err(TaskError::DuplicateOpenTask {
                        dedup_key: task.dedup_key.clone(),
                    })
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn get_task(&self, id: TaskId) -> TaskResult<Option<Task>> {
        let row = TaskRow::get_by_id(self.pool.inner(), Uuid::from(id))
            .await
            .map_err(DbError::from)?;
        Ok(row.map(TaskRow::into_task).transpose()?)
    }

    async fn find_open_by_dedup(&self, dedup_key: &str) -> TaskResult<Option<Task>> {
        let row = TaskRow::find_open_by_dedup(self.pool.inner(), dedup_key)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(TaskRow::into_task).transpose()?)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> TaskResult<Vec<Task>> {
        let rows = TaskRow::list(self.pool.inner(), filter)
            .await
            .map_err(DbError::from)?;
        Ok(tasks(rows)?)
    }

    async fn update_task(&self, task: &Task, expected: TaskStatus) -> TaskResult<bool> {
        let updated = TaskRow::update_if_status(self.pool.inner(), task, expected)
            .await
            .map_err(DbError::from)?;
        if updated {
            return Ok(true);
        }
        // Distinguish a lost race from a missing row.
        match TaskRow::get_by_id(self.pool.inner(), Uuid::from(task.id))
            .await
            .map_err(DbError::from)?
        {
            Some(_) => Ok(false),
            None => Err(TaskError::TaskNotFound { task_id: task.id }),
        }
    }

    async fn statistics(&self) -> TaskResult<TaskStatistics> {
        Ok(TaskRow::statistics(self.pool.inner())
            .await
            .map_err(DbError::from)?)
    }
}
