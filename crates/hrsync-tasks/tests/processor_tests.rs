//! Task Processor Tests
//!
//! Covers phase ordering, per-task error isolation, dispatch to registered
//! handlers and pickup of follow-up tasks within the same pass.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use hrsync_core::TaskId;
use hrsync_events::{codes, EventLog, MemorySink};
use hrsync_tasks::{
    HandlerError, HandlerRegistry, HandlerResult, InMemoryTaskStore, NewTask, Task, TaskAction,
    TaskError, TaskFilter, TaskHandler, TaskObject, TaskOutcome, TaskProcessor, TaskQueue,
    TaskResult, TaskStatistics, TaskStatus, TaskStore, TaskTarget, TaskTriple, TaskType,
    TaskTypeRegistry, BLOCKING_MESSAGE,
};

const ROLE_ADD: TaskTriple = TaskTriple::new(TaskTarget::Db, TaskObject::Role, TaskAction::Add);
const EMPLOYEE_ADD: TaskTriple =
    TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Add);
const RELATION_ADD: TaskTriple =
    TaskTriple::new(TaskTarget::Db, TaskObject::PropRelation, TaskAction::Add);
const USER_ADD: TaskTriple = TaskTriple::new(TaskTarget::Ldap, TaskObject::User, TaskAction::Add);

// =============================================================================
// Test handlers
// =============================================================================

/// Records the dispatch name and person of every task it sees.
#[derive(Default)]
struct RecordingHandler {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let person = task.data["personId"].as_str().unwrap_or_default();
        self.seen
            .lock()
            .await
            .push(format!("{}:{person}", task.triple.dispatch_name()));
        Ok(())
    }
}

/// Fails for one person id, succeeds otherwise.
struct FailFor(&'static str);

#[async_trait]
impl TaskHandler for FailFor {
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        if task.data["personId"] == self.0 {
            return Err(HandlerError::NotFound(format!("person {}", self.0)));
        }
        Ok(())
    }
}

/// Enqueues a directory task for every employee it creates.
struct FollowUpHandler {
    queue: TaskQueue,
}

#[async_trait]
impl TaskHandler for FollowUpHandler {
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        self.queue
            .enqueue(NewTask::new(USER_ADD, task.data.clone()))
            .await?;
        Ok(())
    }
}

/// Task store that cannot record completion of one person's tasks.
struct CompletionFailsFor {
    inner: InMemoryTaskStore,
    person: &'static str,
}

#[async_trait]
impl TaskStore for CompletionFailsFor {
    async fn find_type(&self, triple: &TaskTriple) -> TaskResult<Option<TaskType>> {
        self.inner.find_type(triple).await
    }

    async fn insert_type(&self, task_type: &TaskType) -> TaskResult<()> {
        self.inner.insert_type(task_type).await
    }

    async fn list_types(&self) -> TaskResult<Vec<TaskType>> {
        self.inner.list_types().await
    }

    async fn insert_task(&self, task: &Task) -> TaskResult<()> {
        self.inner.insert_task(task).await
    }

    async fn get_task(&self, id: TaskId) -> TaskResult<Option<Task>> {
        self.inner.get_task(id).await
    }

    async fn find_open_by_dedup(&self, dedup_key: &str) -> TaskResult<Option<Task>> {
        self.inner.find_open_by_dedup(dedup_key).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> TaskResult<Vec<Task>> {
        self.inner.list_tasks(filter).await
    }

    async fn update_task(&self, task: &Task, expected: TaskStatus) -> TaskResult<bool> {
        if task.status == TaskStatus::CompletedOk && task.data["personId"] == self.person {
            return Err(TaskError::store("connection reset"));
        }
        self.inner.update_task(task, expected).await
    }

    async fn statistics(&self) -> TaskResult<TaskStatistics> {
        self.inner.statistics().await
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct Fixture {
    queue: TaskQueue,
    sink: Arc<MemorySink>,
}

fn fixture() -> Fixture {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let registry = Arc::new(TaskTypeRegistry::new(store.clone()));
    let sink = Arc::new(MemorySink::new());
    let queue = TaskQueue::new(registry, store, EventLog::new(sink.clone()));
    Fixture { queue, sink }
}

async fn enqueue(queue: &TaskQueue, triple: TaskTriple, person: &str) -> Task {
    queue
        .enqueue(NewTask::new(triple, json!({"personId": person})).with_identity(person))
        .await
        .unwrap()
        .into_task()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_processes_in_phase_order() {
    let fx = fixture();
    enqueue(&fx.queue, RELATION_ADD, "p1").await;
    enqueue(&fx.queue, EMPLOYEE_ADD, "p1").await;
    enqueue(&fx.queue, ROLE_ADD, "r1").await;

    let recorder = Arc::new(RecordingHandler::default());
    let seen = recorder.seen.clone();
    let handlers = HandlerRegistry::new()
        .with(ROLE_ADD, recorder.clone())
        .with(EMPLOYEE_ADD, recorder.clone())
        .with(RELATION_ADD, recorder);
    let processor = TaskProcessor::new(fx.queue.clone(), handlers);

    let result = processor.process_all_pending().await.unwrap();

    assert_eq!(result.total, 3);
    assert!(result.all_succeeded());
    assert_eq!(
        *seen.lock().await,
        vec![
            "db_role_add:r1".to_string(),
            "db_employee_add:p1".to_string(),
            "db_proprelation_add:p1".to_string(),
        ]
    );
    assert_eq!(fx.sink.with_code(codes::TASK_ALL_START).await.len(), 1);
    assert_eq!(fx.sink.with_code(codes::TASK_ALL_DONE).await.len(), 1);
}

#[tokio::test]
async fn test_failure_does_not_abort_batch() {
    let fx = fixture();
    let bad = enqueue(&fx.queue, EMPLOYEE_ADD, "bad").await;
    let good = enqueue(&fx.queue, EMPLOYEE_ADD, "good").await;

    let handlers = HandlerRegistry::new().with(EMPLOYEE_ADD, Arc::new(FailFor("bad")));
    let processor = TaskProcessor::new(fx.queue.clone(), handlers);
    let result = processor.process_all_pending().await.unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.failed_types(), vec!["DB_EMPLOYEE_ADD"]);

    let bad = fx.queue.get(bad.id).await.unwrap();
    assert_eq!(bad.status, TaskStatus::Error);
    assert_eq!(bad.retry_count, 1);
    assert!(bad.error_description.unwrap().contains("person bad"));
    assert!(bad.processing_started_at.is_some());

    let good = fx.queue.get(good.id).await.unwrap();
    assert_eq!(good.status, TaskStatus::CompletedOk);
    assert!(good.error_description.is_none());

    assert_eq!(fx.sink.with_code(codes::TASK_FAILED).await.len(), 1);
}

#[tokio::test]
async fn test_store_error_on_completion_does_not_abort_batch() {
    let store: Arc<dyn TaskStore> = Arc::new(CompletionFailsFor {
        inner: InMemoryTaskStore::new(),
        person: "p1",
    });
    let registry = Arc::new(TaskTypeRegistry::new(store.clone()));
    let sink = Arc::new(MemorySink::new());
    let queue = TaskQueue::new(registry, store, EventLog::new(sink.clone()));
    let stuck = enqueue(&queue, EMPLOYEE_ADD, "p1").await;
    let done = enqueue(&queue, EMPLOYEE_ADD, "p2").await;

    let handlers =
        HandlerRegistry::new().with(EMPLOYEE_ADD, Arc::new(RecordingHandler::default()));
    let processor = TaskProcessor::new(queue.clone(), handlers);
    let result = processor.process_all_pending().await.unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(queue.get(stuck.id).await.unwrap().status, TaskStatus::Processing);
    assert_eq!(queue.get(done.id).await.unwrap().status, TaskStatus::CompletedOk);
    assert_eq!(sink.with_code(codes::TASK_FAILED).await.len(), 1);
}

#[tokio::test]
async fn test_missing_handler_fails_task() {
    let fx = fixture();
    let task = enqueue(&fx.queue, EMPLOYEE_ADD, "p1").await;
    let processor = TaskProcessor::new(fx.queue.clone(), HandlerRegistry::new());

    let outcome = processor.process_task(task.id).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Failed);
    let stored = fx.queue.get(task.id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Error);
    assert!(stored
        .error_description
        .unwrap()
        .contains("No handler registered for db_employee_add"));
}

#[tokio::test]
async fn test_follow_up_tasks_run_in_same_pass() {
    let fx = fixture();
    enqueue(&fx.queue, EMPLOYEE_ADD, "p1").await;

    let recorder = Arc::new(RecordingHandler::default());
    let seen = recorder.seen.clone();
    let handlers = HandlerRegistry::new()
        .with(
            EMPLOYEE_ADD,
            Arc::new(FollowUpHandler {
                queue: fx.queue.clone(),
            }),
        )
        .with(USER_ADD, recorder);
    let processor = TaskProcessor::new(fx.queue.clone(), handlers);

    let result = processor.process_all_pending().await.unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(*seen.lock().await, vec!["ldap_user_add:p1".to_string()]);
}

#[tokio::test]
async fn test_manual_tasks_are_not_auto_processed() {
    let fx = fixture();
    let blocking = fx
        .queue
        .enqueue(NewTask::new(BLOCKING_MESSAGE, json!({"message": "stop"})))
        .await
        .unwrap()
        .into_task();
    enqueue(&fx.queue, EMPLOYEE_ADD, "p1").await;

    let handlers =
        HandlerRegistry::new().with(EMPLOYEE_ADD, Arc::new(RecordingHandler::default()));
    let processor = TaskProcessor::new(fx.queue.clone(), handlers);
    let result = processor.process_all_pending().await.unwrap();

    assert_eq!(result.total, 1);
    assert_eq!(
        fx.queue.get(blocking.id).await.unwrap().status,
        TaskStatus::New
    );
    assert!(!fx.sink.with_code(codes::TASK_MANUAL_PENDING).await.is_empty());
}

#[tokio::test]
async fn test_process_by_type_only_touches_that_type() {
    let fx = fixture();
    let role = enqueue(&fx.queue, ROLE_ADD, "r1").await;
    let employee = enqueue(&fx.queue, EMPLOYEE_ADD, "p1").await;

    let recorder = Arc::new(RecordingHandler::default());
    let handlers = HandlerRegistry::new()
        .with(ROLE_ADD, recorder.clone())
        .with(EMPLOYEE_ADD, recorder);
    let processor = TaskProcessor::new(fx.queue.clone(), handlers);

    let result = processor.process_by_type(EMPLOYEE_ADD).await.unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(fx.queue.get(employee.id).await.unwrap().status, TaskStatus::CompletedOk);
    assert_eq!(fx.queue.get(role.id).await.unwrap().status, TaskStatus::New);
    assert_eq!(fx.sink.with_code(codes::TASK_TYPE_START).await.len(), 1);
    assert_eq!(fx.sink.with_code(codes::TASK_TYPE_DONE).await.len(), 1);
}

#[tokio::test]
async fn test_completed_task_is_not_reprocessed() {
    let fx = fixture();
    let task = enqueue(&fx.queue, EMPLOYEE_ADD, "p1").await;
    let handlers =
        HandlerRegistry::new().with(EMPLOYEE_ADD, Arc::new(RecordingHandler::default()));
    let processor = TaskProcessor::new(fx.queue.clone(), handlers);

    assert_eq!(processor.process_task(task.id).await.unwrap(), TaskOutcome::Completed);
    assert_eq!(processor.process_task(task.id).await.unwrap(), TaskOutcome::Skipped);
}
