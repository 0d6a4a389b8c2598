//! Sync Runner Tests
//!
//! Full and differential runs over replay fixtures in a temporary storage
//! root, plus failure paths driven by a scripted import source.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tokio::sync::Mutex;

use hrsync_core::{MemoryStore, Org, OrgId, Role};
use hrsync_events::{codes, EventLog, MemorySink};
use hrsync_import::{
    ImportAdapter, ImportBatch, ImportCategory, ImportConfig, ImportError, ImportMode,
    ImportResult, ImportSource, StaticCredentialStore,
};
use hrsync_reconcile::{
    standard_handlers, InMemoryRunLock, LoggingDirectoryService, ReconciliationEngine, RunLock,
    SyncConfig, SyncError, SyncRunner, SYNC_LOCK,
};
use hrsync_tasks::{
    InMemoryTaskStore, NewTask, TaskProcessor, TaskQueue, TaskTypeRegistry, BLOCKING_MESSAGE,
};

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    store: Arc<MemoryStore>,
    queue: TaskQueue,
    lock: Arc<InMemoryRunLock>,
    sink: Arc<MemorySink>,
    runner: SyncRunner,
}

fn harness(source: Arc<dyn ImportSource>, root: &Path) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let tasks = Arc::new(InMemoryTaskStore::new());
    let sink = Arc::new(MemorySink::new());
    let events = EventLog::new(sink.clone());
    let registry = Arc::new(TaskTypeRegistry::new(tasks.clone()));
    let queue = TaskQueue::new(registry, tasks, events.clone());

    let engine = Arc::new(ReconciliationEngine::new(
        store.clone(),
        store.clone(),
        queue.clone(),
        events.clone(),
    ));
    let handlers = standard_handlers(
        store.clone(),
        store.clone(),
        queue.clone(),
        Arc::new(LoggingDirectoryService),
    );
    let processor = Arc::new(TaskProcessor::new(queue.clone(), handlers));
    let lock = Arc::new(InMemoryRunLock::new());

    let config = SyncConfig {
        institutions: vec!["001".to_string()],
        storage_root: root.to_path_buf(),
        ..SyncConfig::default()
    };
    let runner = SyncRunner::new(source, engine, processor, lock.clone(), events).with_config(config);

    Harness {
        store,
        queue,
        lock,
        sink,
        runner,
    }
}

fn replay_adapter(root: &Path, sink: &Arc<MemorySink>) -> Arc<ImportAdapter> {
    let config = ImportConfig {
        storage_root: root.to_path_buf(),
        institutions: vec!["001".to_string()],
        ..ImportConfig::default()
    };
    Arc::new(
        ImportAdapter::new(
            config,
            Arc::new(StaticCredentialStore::new()),
            EventLog::new(sink.clone()),
        )
        .unwrap(),
    )
}

fn write_fixture(root: &Path, relative: &str, body: serde_json::Value) {
    let path = root.join("dev").join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body.to_string()).unwrap();
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

async fn seed_reference(store: &MemoryStore) {
    store
        .insert_org(Org {
            id: OrgId::new(),
            name: "Sint-Jan".to_string(),
            inst_nr: "001".to_string(),
            org_type: Some("SCHOOL".to_string()),
            is_administrative: false,
            is_active: true,
            import_source: true,
        })
        .await;
    store.insert_role(Role::new("Leraar", "LKR")).await;
}

/// Import source with scripted failures.
struct ScriptedSource {
    storage_fails: bool,
    failing: Vec<ImportCategory>,
    calls: Mutex<Vec<ImportCategory>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            storage_fails: false,
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ImportSource for ScriptedSource {
    async fn ensure_storage(&self) -> ImportResult<()> {
        if self.storage_fails {
            return Err(ImportError::Config("read-only storage".to_string()));
        }
        Ok(())
    }

    async fn fetch(
        &self,
        _mode: ImportMode,
        category: ImportCategory,
        _institutions: &[String],
        _changed_since: Option<&str>,
    ) -> ImportResult<ImportBatch> {
        self.calls.lock().await.push(category);
        if self.failing.contains(&category) {
            return Err(ImportError::token("identity server unreachable"));
        }
        Ok(ImportBatch::new(category))
    }
}

// ============================================================================
// Full sync
// ============================================================================

#[tokio::test]
async fn test_replay_sync_creates_people_and_releases_lock() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixture(
        tmp.path(),
        "dev-employees-001.json",
        json!([
            {"personId": "E1", "voornaam": "An", "naam": "Peeters"},
            {"personId": "E2", "firstName": "Bram", "lastName": "Claes", "isActive": true}
        ]),
    );
    write_fixture(
        tmp.path(),
        "dev-employeeassignments-001.json",
        json!([{"personId": "E1", "id": "a1", "ambtCode": "LKR"}]),
    );
    let sink = Arc::new(MemorySink::new());
    let h = harness(replay_adapter(tmp.path(), &sink), tmp.path());
    seed_reference(&h.store).await;

    let report = h.runner.execute_sync_on(ImportMode::Replay, today()).await.unwrap();

    assert_eq!(report.employees, 2);
    assert_eq!(report.assignments, Some(1));
    assert_eq!(report.reconciliation.identities.enqueued, 2);
    let processing = report.processing.unwrap();
    assert!(processing.all_succeeded());
    assert_eq!(h.store.persons().await.len(), 2);
    assert!(!h.lock.is_held());

    // Second run materializes the edge for the now-known person.
    let report = h.runner.execute_sync_on(ImportMode::Replay, today()).await.unwrap();
    assert_eq!(report.reconciliation.identities.enqueued, 0);
    assert_eq!(report.reconciliation.relationships.enqueued, 1);
    assert_eq!(h.store.assignments().await.len(), 1);
}

#[tokio::test]
async fn test_missing_assignments_skip_relationships() {
    let tmp = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource {
        failing: vec![ImportCategory::EmployeeAssignments],
        ..ScriptedSource::new()
    });
    let h = harness(source, tmp.path());

    let report = h.runner.execute_sync_on(ImportMode::Replay, today()).await.unwrap();

    assert_eq!(report.assignments, None);
    assert!(report.reconciliation.relationships_skipped);
    assert!(!h.sink.with_code(codes::SYNC_ERROR).await.is_empty());
}

#[tokio::test]
async fn test_employee_fetch_failure_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource {
        failing: vec![ImportCategory::Employees],
        ..ScriptedSource::new()
    });
    let h = harness(source.clone(), tmp.path());

    let err = h.runner.execute_sync_on(ImportMode::Live, today()).await.unwrap_err();

    assert!(matches!(err, SyncError::Fetch(_)));
    assert!(!h.lock.is_held());
    // Nothing after the employee fetch was attempted.
    assert_eq!(*source.calls.lock().await, vec![ImportCategory::Employees]);
    assert!(!h.sink.with_code(codes::SYNC_ERROR).await.is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource {
        storage_fails: true,
        ..ScriptedSource::new()
    });
    let h = harness(source.clone(), tmp.path());

    let err = h.runner.execute_sync_on(ImportMode::Replay, today()).await.unwrap_err();

    assert!(matches!(err, SyncError::Storage(_)));
    assert!(source.calls.lock().await.is_empty());
}

#[tokio::test]
async fn test_blocking_message_aborts_run() {
    let tmp = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::new());
    let h = harness(source.clone(), tmp.path());
    h.queue
        .enqueue(NewTask::new(BLOCKING_MESSAGE, json!({"name": "Check the HR export"})))
        .await
        .unwrap();

    let err = h.runner.execute_sync_on(ImportMode::Replay, today()).await.unwrap_err();

    assert!(matches!(err, SyncError::Blocked));
    assert!(source.calls.lock().await.is_empty());
    assert!(!h.lock.is_held());
}

#[tokio::test]
async fn test_concurrent_run_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(Arc::new(ScriptedSource::new()), tmp.path());
    assert!(h.lock.try_acquire(SYNC_LOCK, "other-process").await.unwrap());

    let err = h.runner.execute_sync_on(ImportMode::Replay, today()).await.unwrap_err();

    assert!(matches!(err, SyncError::AlreadyRunning));
    // The foreign holder keeps its lock.
    assert!(h.lock.is_held());
}

// ============================================================================
// Differential sync
// ============================================================================

#[tokio::test]
async fn test_diff_sync_advances_checkpoint() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixture(
        tmp.path(),
        "dev-registrations-001.json",
        json!([{"persoonId": "S1", "regInstNr": "001"}]),
    );
    write_fixture(
        tmp.path(),
        "students/dev-students-001.json",
        json!({"students": [{"persoonId": "S1", "voornaam": "Lies"}]}),
    );
    let sink = Arc::new(MemorySink::new());
    let h = harness(replay_adapter(tmp.path(), &sink), tmp.path());

    let first = h.runner.execute_diff_sync(ImportMode::Replay).await.unwrap();
    assert_eq!(first.since, None);
    assert_eq!(first.registrations, 1);
    assert_eq!(first.students, 1);
    let checkpoint = first.checkpoint.unwrap();

    let stored = std::fs::read_to_string(h.runner.config().checkpoint_path()).unwrap();
    assert_eq!(stored, checkpoint);

    let second = h.runner.execute_diff_sync(ImportMode::Replay).await.unwrap();
    assert_eq!(second.since, Some(checkpoint));
}

#[tokio::test]
async fn test_incomplete_diff_sync_keeps_checkpoint() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixture(
        tmp.path(),
        "dev-registrations-001.json",
        json!([{"persoonId": "S1"}]),
    );
    let sink = Arc::new(MemorySink::new());
    let h = harness(replay_adapter(tmp.path(), &sink), tmp.path());
    std::fs::write(h.runner.config().checkpoint_path(), "2025-01-01T00:00:00.000").unwrap();

    let report = h.runner.execute_diff_sync(ImportMode::Replay).await.unwrap();

    assert_eq!(report.since.as_deref(), Some("2025-01-01T00:00:00.000"));
    assert_eq!(report.checkpoint, None);
    let stored = std::fs::read_to_string(h.runner.config().checkpoint_path()).unwrap();
    assert_eq!(stored, "2025-01-01T00:00:00.000");
}
