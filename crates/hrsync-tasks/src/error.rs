//! Error types for the hrsync-tasks crate.

use hrsync_core::{StoreError, TaskId};
use thiserror::Error;

use crate::task::TaskStatus;

/// Task queue and registry errors.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A task type with the same triple or name already exists.
    #[error("Task type already exists: {name}")]
    DuplicateType { name: String },

    /// Task type not registered.
    #[error("Task type not found: {name}")]
    TypeNotFound { name: String },

    /// An open task with the same dedup key already exists.
    #[error("Open task with dedup key {dedup_key} already exists")]
    DuplicateOpenTask { dedup_key: String },

    /// Task not found.
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },

    /// Requested status change is not part of the state machine.
    #[error("Illegal task transition for {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Reset refused: the task has used all of its retries.
    #[error("Task {task_id} exhausted its retries ({retry_count}/{max_retries}); manual handling required")]
    RetriesExhausted {
        task_id: TaskId,
        retry_count: i32,
        max_retries: i32,
    },

    /// Another worker changed the task concurrently.
    #[error("Task {task_id} was modified concurrently (expected status {expected})")]
    ConcurrentModification {
        task_id: TaskId,
        expected: TaskStatus,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend error.
    #[error("Task store error: {0}")]
    Store(String),
}

impl TaskError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

/// Result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors returned by task handlers. The message ends up in the task's
/// `error_description`.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Task payload does not have the expected shape.
    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),

    /// A record the task refers to does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No handler registered for the dispatch name.
    #[error("No handler registered for {0}")]
    Unsupported(String),

    /// Identity or reference store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Failure while enqueueing follow-up tasks.
    #[error("Queue error: {0}")]
    Queue(#[from] TaskError),

    /// External directory service failure.
    #[error("Directory error: {0}")]
    Directory(String),
}

impl HandlerError {
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidPayload(e.to_string())
    }
}

/// Result type for task handlers.
pub type HandlerResult<T> = Result<T, HandlerError>;
