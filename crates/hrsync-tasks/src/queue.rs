//! Durable task queue.
//!
//! Enqueueing resolves the task type through the registry, computes the
//! open-task dedup key and inserts a `new` task unless an equivalent open task
//! already exists. Status changes go through compare-and-set updates so two
//! workers never both move the same task out of `new`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use hrsync_core::TaskId;
use hrsync_events::{codes, EventLog};

use crate::dedup::dedup_key;
use crate::error::{TaskError, TaskResult};
use crate::registry::TaskTypeRegistry;
use crate::store::{TaskFilter, TaskStatistics, TaskStore};
use crate::task::{NewTask, Task, TaskStatus, DEFAULT_MAX_RETRIES};
use crate::types::{TaskAction, TaskObject, TaskTarget, TaskTriple};

/// Triple of the operator message that blocks every sync run while `new`.
pub const BLOCKING_MESSAGE: TaskTriple = TaskTriple::new(
    TaskTarget::System,
    TaskObject::BlockingMessage,
    TaskAction::Manual,
);

/// Triple of the manual role-mapping task.
pub const MANUAL_ROLE: TaskTriple =
    TaskTriple::new(TaskTarget::All, TaskObject::Role, TaskAction::Manual);

fn default_max_retries() -> i32 {
    DEFAULT_MAX_RETRIES
}

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Failed attempts after which a task is no longer reset automatically.
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

/// Result of an enqueue request.
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// A new task was inserted.
    Created(Task),
    /// An equivalent open task already existed and was returned instead.
    Duplicate(Task),
}

impl EnqueueOutcome {
    #[must_use]
    pub fn task(&self) -> &Task {
        match self {
            Self::Created(task) | Self::Duplicate(task) => task,
        }
    }

    #[must_use]
    pub fn into_task(self) -> Task {
        match self {
            Self::Created(task) | Self::Duplicate(task) => task,
        }
    }

    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Outcome of a bulk reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    /// Tasks moved back to `new`.
    pub reset: usize,
    /// Tasks left in `error` because their retries are used up.
    pub exhausted: Vec<TaskId>,
}

/// Durable task queue.
#[derive(Clone)]
pub struct TaskQueue {
    registry: Arc<TaskTypeRegistry>,
    store: Arc<dyn TaskStore>,
    events: EventLog,
    config: QueueConfig,
}

impl TaskQueue {
    /// Create a queue over a store. The registry must share the same store.
    #[must_use]
    pub fn new(registry: Arc<TaskTypeRegistry>, store: Arc<dyn TaskStore>, events: EventLog) -> Self {
        Self {
            registry,
            store,
            events,
            config: QueueConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TaskTypeRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Enqueue a task, or return the equivalent open task.
    #[instrument(skip(self, request), fields(task_type = %request.triple))]
    pub async fn enqueue(&self, request: NewTask) -> TaskResult<EnqueueOutcome> {
        let task_type = self.registry.get_or_create(request.triple).await?;
        let key = dedup_key(
            &request.triple,
            request.identity.as_deref(),
            &request.data,
            request.data2.as_ref(),
        );

        if let Some(existing) = self.store.find_open_by_dedup(&key).await? {
            debug!(task_id = %existing.id, "Open task already queued");
            return Ok(EnqueueOutcome::Duplicate(existing));
        }

        let task = Task::create(&task_type, request, key, self.config.max_retries);
        match self.store.insert_task(&task).await {
            Ok(()) => {}
            Err(TaskError::DuplicateOpenTask { dedup_key }) => {
                // Another writer inserted the same work between lookup and insert.
                return match self.store.find_open_by_dedup(&dedup_key).await? {
                    Some(existing) => Ok(EnqueueOutcome::Duplicate(existing)),
                    None => Err(TaskError::DuplicateOpenTask { dedup_key }),
                };
            }
            Err(e) => return Err(e),
        }

        info!(task_id = %task.id, name = %task.name, "Task created");
        self.events
            .record_event(codes::TASK_CREATED, format!("Task created: {}", task.name))
            .await;
        Ok(EnqueueOutcome::Created(task))
    }

    pub async fn get(&self, id: TaskId) -> TaskResult<Task> {
        self.store
            .get_task(id)
            .await?
            .ok_or(TaskError::TaskNotFound { task_id: id })
    }

    /// Pending (`new`, not archived) tasks of one type, oldest first.
    pub async fn pending(&self, triple: TaskTriple) -> TaskResult<Vec<Task>> {
        let Some(task_type) = self.registry.find(triple).await? else {
            return Ok(Vec::new());
        };
        self.store
            .list_tasks(&TaskFilter::pending().with_type(task_type.id))
            .await
    }

    pub async fn list(&self, filter: &TaskFilter) -> TaskResult<Vec<Task>> {
        self.store.list_tasks(filter).await
    }

    /// `new → processing`; fails if another worker claimed the task first.
    pub async fn mark_processing(&self, task: &Task) -> TaskResult<Task> {
        let mut claimed = task.clone();
        claimed.start(Utc::now())?;
        self.save(&claimed, TaskStatus::New).await?;
        Ok(claimed)
    }

    /// `processing → completed_ok`.
    pub async fn mark_completed(&self, task: &Task) -> TaskResult<Task> {
        let mut done = task.clone();
        done.complete(Utc::now())?;
        self.save(&done, TaskStatus::Processing).await?;
        Ok(done)
    }

    /// `processing → error` with the failure message.
    pub async fn mark_failed(&self, task: &Task, message: &str) -> TaskResult<Task> {
        let mut failed = task.clone();
        failed.fail(message, Utc::now())?;
        self.save(&failed, TaskStatus::Processing).await?;
        Ok(failed)
    }

    /// Bounded reset of one `error` task.
    #[instrument(skip(self))]
    pub async fn reset_task(&self, id: TaskId) -> TaskResult<Task> {
        let mut task = self.get(id).await?;
        let expected = task.status;
        task.reset(Utc::now())?;
        self.save(&task, expected).await?;
        info!(task_id = %id, retry_count = task.retry_count, "Task reset");
        Ok(task)
    }

    /// Operator override: reset regardless of the retry bound.
    #[instrument(skip(self))]
    pub async fn force_reset_task(&self, id: TaskId) -> TaskResult<Task> {
        let mut task = self.get(id).await?;
        let expected = task.status;
        task.force_reset(Utc::now())?;
        self.save(&task, expected).await?;
        warn!(task_id = %id, "Task force-reset by operator");
        Ok(task)
    }

    /// Reset every `error` task (optionally of one type) that has retries left.
    #[instrument(skip(self))]
    pub async fn reset_error_tasks(&self, triple: Option<TaskTriple>) -> TaskResult<ResetSummary> {
        let Some(filter) = self.filter_for(triple, TaskStatus::Error).await? else {
            return Ok(ResetSummary::default());
        };
        let mut summary = ResetSummary::default();
        for mut task in self.store.list_tasks(&filter).await? {
            if task.is_exhausted() {
                summary.exhausted.push(task.id);
                continue;
            }
            task.reset(Utc::now())?;
            if self.store.update_task(&task, TaskStatus::Error).await? {
                summary.reset += 1;
            }
        }
        if !summary.exhausted.is_empty() {
            warn!(
                count = summary.exhausted.len(),
                "Error tasks exhausted their retries and need manual handling"
            );
        }
        info!(reset = summary.reset, "Error tasks reset");
        Ok(summary)
    }

    /// Archive every pending task (optionally of one type).
    #[instrument(skip(self))]
    pub async fn cancel_pending(&self, triple: Option<TaskTriple>) -> TaskResult<usize> {
        let Some(filter) = self.filter_for(triple, TaskStatus::New).await? else {
            return Ok(0);
        };
        let mut cancelled = 0;
        for mut task in self.store.list_tasks(&filter).await? {
            task.archive(Utc::now())?;
            if self.store.update_task(&task, TaskStatus::New).await? {
                cancelled += 1;
            }
        }
        info!(cancelled = cancelled, "Pending tasks cancelled");
        Ok(cancelled)
    }

    /// Move tasks stuck in `processing` for longer than `older_than` to `error`.
    #[instrument(skip(self))]
    pub async fn release_stale(&self, older_than: Duration) -> TaskResult<usize> {
        let cutoff = Utc::now() - older_than;
        let filter = TaskFilter::default().with_status(TaskStatus::Processing);
        let mut released = 0;
        for mut task in self.store.list_tasks(&filter).await? {
            let stale = !task.processing_started_at.is_some_and(|t| t >= cutoff);
            if !stale {
                continue;
            }
            task.fail("Processing did not finish in time", Utc::now())?;
            if self.store.update_task(&task, TaskStatus::Processing).await? {
                warn!(task_id = %task.id, "Released stale task");
                released += 1;
            }
        }
        Ok(released)
    }

    pub async fn statistics(&self) -> TaskResult<TaskStatistics> {
        self.store.statistics().await
    }

    /// Whether an operator blocking message is still open.
    pub async fn blocking_tasks_pending(&self) -> TaskResult<bool> {
        Ok(!self.pending(BLOCKING_MESSAGE).await?.is_empty())
    }

    /// Number of open manual role-mapping tasks.
    pub async fn manual_tasks_pending(&self) -> TaskResult<usize> {
        Ok(self.pending(MANUAL_ROLE).await?.len())
    }

    async fn filter_for(
        &self,
        triple: Option<TaskTriple>,
        status: TaskStatus,
    ) -> TaskResult<Option<TaskFilter>> {
        let filter = TaskFilter::default().with_status(status);
        match triple {
            None => Ok(Some(filter)),
            Some(triple) => Ok(self
                .registry
                .find(triple)
                .await?
                .map(|t| filter.with_type(t.id))),
        }
    }

    async fn save(&self, task: &Task, expected: TaskStatus) -> TaskResult<()> {
        if self.store.update_task(task, expected).await? {
            Ok(())
        } else {
            Err(TaskError::ConcurrentModification {
                task_id: task.id,
                expected,
            })
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTaskStore;
    use crate::task::UpdateHint;
    use hrsync_events::MemorySink;
    use serde_json::json;

    const EMPLOYEE_UPD: TaskTriple =
        TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Upd);

    fn queue() -> (TaskQueue, Arc<MemorySink>) {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(TaskTypeRegistry::new(store.clone()));
        let sink = Arc::new(MemorySink::new());
        let queue = TaskQueue::new(registry, store, EventLog::new(sink.clone()));
        (queue, sink)
    }

    fn update(person: &str, hint: &UpdateHint) -> NewTask {
        NewTask::new(EMPLOYEE_UPD, json!({"personId": person}))
            .with_hint(hint)
            .with_identity(format!("{person}@001"))
    }

    #[tokio::test]
    async fn test_enqueue_dedups_open_tasks() {
        let (queue, sink) = queue();
        let first = queue.enqueue(update("p1", &UpdateHint::Update)).await.unwrap();
        let second = queue.enqueue(update("p1", &UpdateHint::Update)).await.unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(first.task().id, second.task().id);
        assert_eq!(sink.with_code(codes::TASK_CREATED).await.len(), 1);
    }

    #[tokio::test]
    async fn test_different_hint_is_different_work() {
        let (queue, _) = queue();
        queue.enqueue(update("p1", &UpdateHint::Update)).await.unwrap();
        let other = queue
            .enqueue(update("p1", &UpdateHint::Reactivate))
            .await
            .unwrap();
        assert!(other.is_created());
        assert_eq!(queue.pending(EMPLOYEE_UPD).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_completed_task_does_not_block_new_enqueue() {
        let (queue, _) = queue();
        let task = queue
            .enqueue(update("p1", &UpdateHint::Update))
            .await
            .unwrap()
            .into_task();
        let task = queue.mark_processing(&task).await.unwrap();
        queue.mark_completed(&task).await.unwrap();

        let again = queue.enqueue(update("p1", &UpdateHint::Update)).await.unwrap();
        assert!(again.is_created());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let (queue, _) = queue();
        let task = queue
            .enqueue(update("p1", &UpdateHint::Update))
            .await
            .unwrap()
            .into_task();
        queue.mark_processing(&task).await.unwrap();
        let err = queue.mark_processing(&task).await.unwrap_err();
        assert!(matches!(err, TaskError::ConcurrentModification { .. }));
    }

    #[tokio::test]
    async fn test_reset_error_tasks_respects_bound() {
        let (queue, _) = queue();
        let queue = queue.with_config(QueueConfig { max_retries: 1 });
        let task = queue
            .enqueue(update("p1", &UpdateHint::Update))
            .await
            .unwrap()
            .into_task();
        let task = queue.mark_processing(&task).await.unwrap();
        let failed = queue.mark_failed(&task, "boom").await.unwrap();
        assert!(failed.is_exhausted());

        let summary = queue.reset_error_tasks(None).await.unwrap();
        assert_eq!(summary.reset, 0);
        assert_eq!(summary.exhausted, vec![failed.id]);
        assert!(matches!(
            queue.reset_task(failed.id).await.unwrap_err(),
            TaskError::RetriesExhausted { .. }
        ));

        let forced = queue.force_reset_task(failed.id).await.unwrap();
        assert_eq!(forced.status, TaskStatus::New);
        assert_eq!(forced.retry_count, 0);
    }

    #[tokio::test]
    async fn test_cancel_pending_archives() {
        let (queue, _) = queue();
        queue.enqueue(update("p1", &UpdateHint::Update)).await.unwrap();
        queue.enqueue(update("p2", &UpdateHint::Update)).await.unwrap();

        assert_eq!(queue.cancel_pending(Some(EMPLOYEE_UPD)).await.unwrap(), 2);
        assert!(queue.pending(EMPLOYEE_UPD).await.unwrap().is_empty());
        let stats = queue.statistics().await.unwrap();
        assert_eq!(stats.archived, 2);
        assert_eq!(stats.new, 0);
    }

    #[tokio::test]
    async fn test_release_stale_moves_to_error() {
        let (queue, _) = queue();
        let task = queue
            .enqueue(update("p1", &UpdateHint::Update))
            .await
            .unwrap()
            .into_task();
        queue.mark_processing(&task).await.unwrap();

        assert_eq!(queue.release_stale(Duration::hours(1)).await.unwrap(), 0);
        assert_eq!(queue.release_stale(Duration::zero() - Duration::seconds(1)).await.unwrap(), 1);
        let stored = queue.get(task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Error);
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn test_blocking_message_detection() {
        let (queue, _) = queue();
        assert!(!queue.blocking_tasks_pending().await.unwrap());
        queue
            .enqueue(NewTask::new(BLOCKING_MESSAGE, json!({"message": "HR export broken"})))
            .await
            .unwrap();
        assert!(queue.blocking_tasks_pending().await.unwrap());
        assert_eq!(queue.statistics().await.unwrap().manual_pending, 1);
    }
}
