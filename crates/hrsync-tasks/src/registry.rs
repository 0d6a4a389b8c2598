//! Task type registry.
//!
//! Explicit registry object with an idempotent `get_or_create`. Uniqueness of
//! the triple and of the derived name is enforced by the store; the registry
//! only caches what the store has confirmed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::{TaskError, TaskResult};
use crate::store::TaskStore;
use crate::types::{TaskAction as A, TaskObject as O, TaskTarget as T, TaskTriple, TaskType};

/// Types the engine and processor rely on, with their priorities.
const STANDARD_TYPES: &[(TaskTriple, i32, &str)] = &[
    (TaskTriple::new(T::Db, O::Role, A::Add), 10, "Create a discovered HR role"),
    (TaskTriple::new(T::Db, O::Employee, A::Add), 10, "Create an employee"),
    (TaskTriple::new(T::Db, O::Employee, A::Upd), 20, "Update, reactivate or extend an employee"),
    (TaskTriple::new(T::Db, O::Employee, A::Deact), 30, "Deactivate an employee"),
    (TaskTriple::new(T::Db, O::PropRelation, A::Add), 10, "Create a role assignment"),
    (TaskTriple::new(T::Db, O::PropRelation, A::Deact), 20, "Deactivate a role assignment"),
    (TaskTriple::new(T::Ldap, O::User, A::Add), 10, "Create a directory account"),
    (TaskTriple::new(T::Ldap, O::User, A::Upd), 20, "Update a directory account"),
    (TaskTriple::new(T::Ldap, O::User, A::Deact), 30, "Disable a directory account"),
    (TaskTriple::new(T::Ldap, O::GroupMember, A::Add), 40, "Add a directory group member"),
    (TaskTriple::new(T::Ldap, O::GroupMember, A::Remove), 50, "Remove a directory group member"),
    (TaskTriple::new(T::System, O::BlockingMessage, A::Manual), 0, "Blocks sync until resolved"),
    (TaskTriple::new(T::All, O::Role, A::Manual), 0, "Role needs manual mapping"),
];

/// Registry of task types.
pub struct TaskTypeRegistry {
    store: Arc<dyn TaskStore>,
    cache: RwLock<HashMap<TaskTriple, TaskType>>,
}

impl TaskTypeRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Return the type for the triple, creating it on first use.
    #[instrument(skip(self), fields(task_type = %triple))]
    pub async fn get_or_create(&self, triple: TaskTriple) -> TaskResult<TaskType> {
        if let Some(task_type) = self.find(triple).await? {
            return Ok(task_type);
        }
        self.create(TaskType::new(triple)).await
    }

    /// Look up an existing type.
    pub async fn find(&self, triple: TaskTriple) -> TaskResult<Option<TaskType>> {
        if let Some(cached) = self.cache.read().await.get(&triple) {
            return Ok(Some(cached.clone()));
        }
        let found = self.store.find_type(&triple).await?;
        if let Some(task_type) = &found {
            self.cache.write().await.insert(triple, task_type.clone());
        }
        Ok(found)
    }

    /// Look up an existing type or fail with `TypeNotFound`.
    pub async fn require(&self, triple: TaskTriple) -> TaskResult<TaskType> {
        self.find(triple)
            .await?
            .ok_or_else(|| TaskError::TypeNotFound {
                name: triple.name(),
            })
    }

    async fn create(&self, task_type: TaskType) -> TaskResult<TaskType> {
        let triple = task_type.triple;
        match self.store.insert_type(&task_type).await {
            Ok(()) => {
                debug!(name = %task_type.name, "Registered task type");
                self.cache.write().await.insert(triple, task_type.clone());
                Ok(task_type)
            }
            // Lost a race with another writer: the stored row wins.
            Err(TaskError::DuplicateType { .. }) => self.require(triple).await,
            Err(e) => Err(e),
        }
    }

    /// Create any missing standard type. Returns how many were created.
    #[instrument(skip(self))]
    pub async fn ensure_standard_types(&self) -> TaskResult<usize> {
        let mut created = 0;
        for (triple, priority, description) in STANDARD_TYPES {
            if self.find(*triple).await?.is_some() {
                continue;
            }
            let task_type = TaskType::new(*triple)
                .with_priority(*priority)
                .with_description(*description);
            self.create(task_type).await?;
            created += 1;
        }
        if created > 0 {
            info!(created = created, "Seeded standard task types");
        }
        Ok(created)
    }

    /// All types in processing order.
    pub async fn list(&self) -> TaskResult<Vec<TaskType>> {
        let mut types = self.store.list_types().await?;
        types.sort_by(|a, b| a.processing_order().cmp(&b.processing_order()));
        Ok(types)
    }

    /// Active auto-process types in processing order.
    pub async fn auto_process_types(&self) -> TaskResult<Vec<TaskType>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.is_active && t.auto_process)
            .collect())
    }
}

impl std::fmt::Debug for TaskTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTypeRegistry").finish_non_exhaustive()
    }
}
