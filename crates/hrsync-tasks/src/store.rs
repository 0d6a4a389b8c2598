//! Task persistence contract and in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use hrsync_core::{TaskId, TaskTypeId};

use crate::error::{TaskError, TaskResult};
use crate::task::{Task, TaskStatus};
use crate::types::{TaskTriple, TaskType};

/// Task listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub type_id: Option<TaskTypeId>,
    pub status: Option<TaskStatus>,
    pub include_archived: bool,
    pub limit: Option<usize>,
}

impl TaskFilter {
    /// Non-archived tasks with status `new`.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: Some(TaskStatus::New),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_type(mut self, type_id: TaskTypeId) -> Self {
        self.type_id = Some(type_id);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        (self.include_archived || !task.archived)
            && self.type_id.map_or(true, |t| t == task.type_id)
            && self.status.map_or(true, |s| s == task.status)
    }
}

/// Task counts, archived tasks excluded from the status buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub new: u64,
    pub processing: u64,
    pub completed_ok: u64,
    pub error: u64,
    /// Error tasks that used all their retries.
    pub exhausted: u64,
    pub archived: u64,
    /// `new` tasks of manual or system types.
    pub manual_pending: u64,
}

impl TaskStatistics {
    /// Fold one task into the counters.
    pub fn count(&mut self, task: &Task) {
        if task.archived {
            self.archived += 1;
            return;
        }
        match task.status {
            TaskStatus::New => {
                self.new += 1;
                if task.triple.is_manual() {
                    self.manual_pending += 1;
                }
            }
            TaskStatus::Processing => self.processing += 1,
            TaskStatus::CompletedOk => self.completed_ok += 1,
            TaskStatus::Error => {
                self.error += 1;
                if task.is_exhausted() {
                    self.exhausted += 1;
                }
            }
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.new + self.processing + self.completed_ok + self.error
    }
}

/// Durable storage for task types and tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_type(&self, triple: &TaskTriple) -> TaskResult<Option<TaskType>>;

    /// Insert a type; `DuplicateType` if the triple or name exists.
    async fn insert_type(&self, task_type: &TaskType) -> TaskResult<()>;

    async fn list_types(&self) -> TaskResult<Vec<TaskType>>;

    /// Insert a task; `DuplicateOpenTask` if an open task shares its dedup key.
    async fn insert_task(&self, task: &Task) -> TaskResult<()>;

    async fn get_task(&self, id: TaskId) -> TaskResult<Option<Task>>;

    async fn find_open_by_dedup(&self, dedup_key: &str) -> TaskResult<Option<Task>>;

    /// Tasks matching the filter, oldest first.
    async fn list_tasks(&self, filter: &TaskFilter) -> TaskResult<Vec<Task>>;

    /// Persist `task` only if the stored status still equals `expected`.
    /// Returns `false` when another writer got there first.
    async fn update_task(&self, task: &Task, expected: TaskStatus) -> TaskResult<bool>;

    async fn statistics(&self) -> TaskResult<TaskStatistics>;
}

#[derive(Debug, Default)]
struct State {
    types: HashMap<TaskTypeId, TaskType>,
    tasks: HashMap<TaskId, Task>,
}

/// In-memory task store.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: RwLock<State>,
}

impl InMemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every task regardless of status, oldest first.
    pub async fn all_tasks(&self) -> Vec<Task> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_type(&self, triple: &TaskTriple) -> TaskResult<Option<TaskType>> {
        let state = self.state.read().await;
        Ok(state.types.values().find(|t| &t.triple == triple).cloned())
    }

    async fn insert_type(&self, task_type: &TaskType) -> TaskResult<()> {
        let mut state = self.state.write().await;
        if state
            .types
            .values()
            .any(|t| t.triple == task_type.triple || t.name == task_type.name)
        {
            return Err(TaskError::DuplicateType {
                name: task_type.name.clone(),
            });
        }
        state.types.insert(task_type.id, task_type.clone());
        Ok(())
    }

    async fn list_types(&self) -> TaskResult<Vec<TaskType>> {
        let state = self.state.read().await;
        let mut types: Vec<TaskType> = state.types.values().cloned().collect();
        types.sort_by(|a, b| a.processing_order().cmp(&b.processing_order()));
        Ok(types)
    }

    async fn insert_task(&self, task: &Task) -> TaskResult<()> {
        let mut state = self.state.write().await;
        if task.is_open()
            && state
                .tasks
                .values()
                .any(|t| t.is_open() && t.dedup_key == task.dedup_key)
        {
            return Err(TaskError::DuplicateOpenTask {
                dedup_key: task.dedup_key.clone(),
            });
        }
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> TaskResult<Option<Task>> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn find_open_by_dedup(&self, dedup_key: &str) -> TaskResult<Option<Task>> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .values()
            .find(|t| t.is_open() && t.dedup_key == dedup_key)
            .cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> TaskResult<Vec<Task>> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        if let Some(limit) = filter.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn update_task(&self, task: &Task, expected: TaskStatus) -> TaskResult<bool> {
        let mut state = self.state.write().await;
        match state.tasks.get_mut(&task.id) {
            Some(stored) if stored.status == expected => {
                *stored = task.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(TaskError::TaskNotFound { task_id: task.id }),
        }
    }

    async fn statistics(&self) -> TaskResult<TaskStatistics> {
        let state = self.state.read().await;
        let mut stats = TaskStatistics::default();
        for task in state.tasks.values() {
            stats.count(task);
        }
        Ok(stats)
    }
}
