//! CLI error types and exit codes

use thiserror::Error;

use hrsync_db::DbError;
use hrsync_import::ImportError;
use hrsync_reconcile::SyncError;
use hrsync_tasks::TaskError;

use crate::config::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Another run holds the lock, or a blocking message is pending
/// - 3: Database unreachable
/// - 4: Invalid input
/// - 5: Run finished but some tasks failed
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Task queue error: {0}")]
    Task(#[from] TaskError),

    #[error("Import setup failed: {0}")]
    Import(#[from] ImportError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{failed} task(s) failed: {types}")]
    TasksFailed { failed: usize, types: String },

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Sync(SyncError::AlreadyRunning | SyncError::Blocked) => 2,
            CliError::Database(e) if e.is_connection_error() => 3,
            CliError::Validation(_) => 4,
            CliError::TasksFailed { .. } => 5,
            _ => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        eprintln!("Error: {self}");
    }
}
