//! Error types for reconciliation and sync runs.

use hrsync_core::StoreError;
use hrsync_import::ImportError;
use hrsync_tasks::TaskError;
use thiserror::Error;

/// Reconciliation errors. Any of these aborts the current phase.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Task queue error: {0}")]
    Task(#[from] TaskError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that make a whole sync run fail.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another run holds the run lock.
    #[error("A sync run is already in progress")]
    AlreadyRunning,

    /// An operator blocking message is pending.
    #[error("Sync blocked by pending blocking message")]
    Blocked,

    /// Storage could not be prepared.
    #[error("Storage setup failed: {0}")]
    Storage(String),

    /// A required category could not be fetched.
    #[error("Import failed: {0}")]
    Fetch(#[from] ImportError),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Task processing failed: {0}")]
    Task(#[from] TaskError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Run lock backend failure.
    #[error("Run lock error: {0}")]
    Lock(String),
}

impl SyncError {
    pub fn lock(msg: impl ToString) -> Self {
        Self::Lock(msg.to_string())
    }
}

/// Result type for sync runs.
pub type SyncResult<T> = Result<T, SyncError>;
