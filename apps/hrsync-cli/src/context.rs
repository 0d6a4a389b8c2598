//! Wiring of stores, queue, processor and sync runner for one invocation.

use std::sync::Arc;

use hrsync_db::{DbPool, PgEventSink, PgRunLock, PgStore, PgTaskStore};
use hrsync_events::EventLog;
use hrsync_import::{EnvCredentialStore, ImportAdapter};
use hrsync_reconcile::{
    standard_handlers, LoggingDirectoryService, ReconciliationEngine, SyncRunner,
};
use hrsync_tasks::{TaskProcessor, TaskQueue, TaskStore, TaskTypeRegistry};

use crate::config::AppConfig;
use crate::error::CliResult;

/// Everything a command needs, backed by PostgreSQL.
pub struct AppContext {
    pub config: AppConfig,
    pub pool: DbPool,
    pub queue: TaskQueue,
    pub processor: Arc<TaskProcessor>,
    pub runner: SyncRunner,
}

impl AppContext {
    /// Connect to the database and assemble the components.
    pub async fn connect(config: AppConfig) -> CliResult<Self> {
        let pool = DbPool::connect_with(&config.database_url, config.max_connections).await?;
        Self::assemble(config, pool)
    }

    fn assemble(config: AppConfig, pool: DbPool) -> CliResult<Self> {
        let events = EventLog::new(Arc::new(PgEventSink::new(pool.clone())));

        let task_store: Arc<dyn TaskStore> = Arc::new(PgTaskStore::new(pool.clone()));
        let registry = Arc::new(TaskTypeRegistry::new(Arc::clone(&task_store)));
        let queue = TaskQueue::new(registry, task_store, events.clone());

        let store = Arc::new(PgStore::new(pool.clone()));
        let handlers = standard_handlers(
            store.clone(),
            store.clone(),
            queue.clone(),
            Arc::new(LoggingDirectoryService),
        );
        let processor = Arc::new(TaskProcessor::new(queue.clone(), handlers));
        let engine = Arc::new(ReconciliationEngine::new(
            store.clone(),
            store,
            queue.clone(),
            events.clone(),
        ));

        let source = Arc::new(ImportAdapter::new(
            config.import.clone(),
            Arc::new(EnvCredentialStore::default()),
            events.clone(),
        )?);

        let mut lock = PgRunLock::new(pool.clone());
        if let Some(stale_after) = config.lock_stale_after {
            lock = lock.with_stale_after(stale_after);
        }

        let runner = SyncRunner::new(source, engine, processor.clone(), Arc::new(lock), events)
            .with_config(config.sync_config());

        Ok(Self {
            config,
            pool,
            queue,
            processor,
            runner,
        })
    }
}
