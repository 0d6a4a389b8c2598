//! Task processor.
//!
//! Drains pending tasks in phase order (reference, identity, relationship,
//! account), dispatching each one to the handler registered under its
//! dispatch name. A failing task is recorded as `error` and never aborts the
//! batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use hrsync_core::TaskId;
use hrsync_events::{codes, EventLog};

use crate::error::{HandlerError, HandlerResult, TaskError, TaskResult};
use crate::queue::TaskQueue;
use crate::store::TaskFilter;
use crate::task::{Task, TaskStatus};
use crate::types::{TaskPhase, TaskTriple, TaskType};

/// Side effect for one task type.
///
/// Handlers compute their mutations and apply them in one atomic store call;
/// follow-up tasks are enqueued only after that call succeeds.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> HandlerResult<()>;
}

/// Handlers keyed by dispatch name.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a triple, replacing any earlier one.
    pub fn register(&mut self, triple: TaskTriple, handler: Arc<dyn TaskHandler>) -> &mut Self {
        self.handlers.insert(triple.dispatch_name(), handler);
        self
    }

    #[must_use]
    pub fn with(mut self, triple: TaskTriple, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(triple, handler);
        self
    }

    #[must_use]
    pub fn get(&self, dispatch_name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(dispatch_name).cloned()
    }

    #[must_use]
    pub fn dispatch_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.dispatch_names())
            .finish()
    }
}

fn default_max_tasks_per_type() -> usize {
    10_000
}

/// Processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Upper bound of tasks taken from one type per pass.
    #[serde(default = "default_max_tasks_per_type")]
    pub max_tasks_per_type: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_type: default_max_tasks_per_type(),
        }
    }
}

/// What happened to a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    /// Claimed by another worker, or no longer `new`.
    Skipped,
}

/// Counters for one task type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeProcessingResult {
    pub name: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl TypeProcessingResult {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn count(&mut self, outcome: TaskOutcome) {
        self.total += 1;
        match outcome {
            TaskOutcome::Completed => self.succeeded += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Result of a processing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProcessingResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub per_type: Vec<TypeProcessingResult>,
}

impl BatchProcessingResult {
    fn add(&mut self, result: TypeProcessingResult) {
        self.total += result.total;
        self.succeeded += result.succeeded;
        self.failed += result.failed;
        self.skipped += result.skipped;
        self.per_type.push(result);
    }

    /// Success rate as a percentage.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Names of types that had at least one failure.
    #[must_use]
    pub fn failed_types(&self) -> Vec<&str> {
        self.per_type
            .iter()
            .filter(|r| r.failed > 0)
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Executes pending tasks.
pub struct TaskProcessor {
    queue: TaskQueue,
    handlers: HandlerRegistry,
    events: EventLog,
    config: ProcessorConfig,
}

impl TaskProcessor {
    #[must_use]
    pub fn new(queue: TaskQueue, handlers: HandlerRegistry) -> Self {
        let events = queue.events().clone();
        Self {
            queue,
            handlers,
            events,
            config: ProcessorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Process every pending task of every auto-process type, phase by phase.
    ///
    /// Types are re-listed at the start of each phase so work enqueued by an
    /// earlier phase (e.g. directory tasks created by identity handlers) is
    /// picked up in the same pass.
    #[instrument(skip(self))]
    pub async fn process_all_pending(&self) -> TaskResult<BatchProcessingResult> {
        self.events
            .record_event(codes::TASK_ALL_START, "Processing all pending tasks")
            .await;
        let mut result = BatchProcessingResult::default();
        let mut done: HashSet<TaskTriple> = HashSet::new();

        for phase in TaskPhase::ORDERED {
            let types = match self.queue.registry().auto_process_types().await {
                Ok(types) => types,
                Err(e) => {
                    self.events
                        .record_error(
                            codes::TASK_ERROR,
                            format!("Cannot list task types: {e}"),
                            false,
                        )
                        .await;
                    return Err(e);
                }
            };
            for task_type in types.iter().filter(|t| t.triple.phase() == phase) {
                if !done.insert(task_type.triple) {
                    continue;
                }
                result.add(self.process_type(task_type).await?);
            }
        }

        info!(
            total = result.total,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            "Finished processing pending tasks"
        );
        self.events
            .record_event(
                codes::TASK_ALL_DONE,
                format!(
                    "Processed {} tasks: {} ok, {} failed, {} skipped",
                    result.total, result.succeeded, result.failed, result.skipped
                ),
            )
            .await;
        Ok(result)
    }

    /// Process pending tasks of one type, auto-process or not.
    #[instrument(skip(self), fields(task_type = %triple))]
    pub async fn process_by_type(&self, triple: TaskTriple) -> TaskResult<TypeProcessingResult> {
        match self.queue.registry().find(triple).await? {
            Some(task_type) => self.process_type(&task_type).await,
            None => Ok(TypeProcessingResult::new(triple.name())),
        }
    }

    /// Process one task by id if it is still pending.
    #[instrument(skip(self))]
    pub async fn process_task(&self, id: TaskId) -> TaskResult<TaskOutcome> {
        let task = self.queue.get(id).await?;
        if !task.is_open() || task.status != TaskStatus::New {
            debug!(task_id = %id, status = %task.status, "Task not pending, skipping");
            return Ok(TaskOutcome::Skipped);
        }
        self.run(task).await
    }

    async fn process_type(&self, task_type: &TaskType) -> TaskResult<TypeProcessingResult> {
        let mut result = TypeProcessingResult::new(task_type.name.clone());
        self.events
            .record_event(
                codes::TASK_TYPE_START,
                format!("Processing tasks of type {}", task_type.name),
            )
            .await;

        let manual = self.queue.statistics().await?.manual_pending;
        if manual > 0 {
            warn!(manual_pending = manual, "Manual tasks are waiting for an operator");
            self.events
                .record_event(
                    codes::TASK_MANUAL_PENDING,
                    format!("{manual} manual task(s) still pending"),
                )
                .await;
        }

        let filter = TaskFilter::pending()
            .with_type(task_type.id)
            .with_limit(self.config.max_tasks_per_type);
        for task in self.queue.list(&filter).await? {
            let task_id = task.id;
            let outcome = match self.run(task).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Left in `processing`; release_stale moves it to `error`.
                    error!(task_id = %task_id, error = %e, "Task bookkeeping failed");
                    self.events
                        .record_error(
                            codes::TASK_FAILED,
                            format!("Task {task_id} could not be recorded: {e}"),
                            false,
                        )
                        .await;
                    TaskOutcome::Failed
                }
            };
            result.count(outcome);
        }

        self.events
            .record_event(
                codes::TASK_TYPE_DONE,
                format!(
                    "Finished {}: {} ok, {} failed",
                    task_type.name, result.succeeded, result.failed
                ),
            )
            .await;
        Ok(result)
    }

    async fn run(&self, task: Task) -> TaskResult<TaskOutcome> {
        let task = match self.queue.mark_processing(&task).await {
            Ok(task) => task,
            Err(TaskError::ConcurrentModification { .. }) => {
                debug!(task_id = %task.id, "Task claimed elsewhere");
                return Ok(TaskOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let dispatch = task.triple.dispatch_name();
        let outcome = match self.handlers.get(&dispatch) {
            Some(handler) => handler.handle(&task).await,
            None => Err(HandlerError::Unsupported(dispatch)),
        };

        match outcome {
            Ok(()) => {
                self.queue.mark_completed(&task).await?;
                debug!(task_id = %task.id, name = %task.name, "Task completed");
                Ok(TaskOutcome::Completed)
            }
            Err(e) => {
                let message = e.to_string();
                error!(task_id = %task.id, name = %task.name, error = %message, "Task failed");
                self.queue.mark_failed(&task, &message).await?;
                self.events
                    .record_error(
                        codes::TASK_FAILED,
                        format!("Task {} failed: {message}", task.name),
                        false,
                    )
                    .await;
                Ok(TaskOutcome::Failed)
            }
        }
    }
}

impl std::fmt::Debug for TaskProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProcessor")
            .field("handlers", &self.handlers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
