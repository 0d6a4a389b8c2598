//! # hrsync-tasks
//!
//! Typed, deduplicated work items for the HR reconciliation engine.
//!
//! - [`TaskTypeRegistry`]: `(target, object, action)` classifications with an
//!   idempotent `get_or_create`
//! - [`TaskQueue`]: durable queue enforcing the task state machine and
//!   open-task dedup
//! - [`TaskProcessor`]: phase-ordered execution through registered
//!   [`TaskHandler`]s
//! - [`TaskWorker`]: interval-driven background processing
//!
//! ```rust,ignore
//! let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
//! let registry = Arc::new(TaskTypeRegistry::new(store.clone()));
//! let queue = TaskQueue::new(registry, store, EventLog::tracing_only());
//!
//! queue
//!     .enqueue(NewTask::new(TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Add), data))
//!     .await?;
//!
//! let processor = TaskProcessor::new(queue, handlers);
//! let result = processor.process_all_pending().await?;
//! ```

pub mod dedup;
pub mod error;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod store;
pub mod task;
pub mod types;
pub mod worker;

pub use dedup::{canonicalize, dedup_key};
pub use error::{HandlerError, HandlerResult, TaskError, TaskResult};
pub use processor::{
    BatchProcessingResult, HandlerRegistry, ProcessorConfig, TaskHandler, TaskOutcome,
    TaskProcessor, TypeProcessingResult,
};
pub use queue::{EnqueueOutcome, QueueConfig, ResetSummary, TaskQueue, BLOCKING_MESSAGE, MANUAL_ROLE};
pub use registry::TaskTypeRegistry;
pub use store::{InMemoryTaskStore, TaskFilter, TaskStatistics, TaskStore};
pub use task::{NewTask, Task, TaskStatus, UpdateHint, DEFAULT_MAX_RETRIES};
pub use types::{
    TaskAction, TaskObject, TaskPhase, TaskTarget, TaskTriple, TaskType, DEFAULT_PRIORITY,
};
pub use worker::{TaskWorker, WorkerConfig};
