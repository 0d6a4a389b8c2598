//! Error types for the hrsync-db crate.
//!
//! Wraps `SQLx` errors and maps them onto the error types of the store
//! contracts the Postgres implementations serve.

use hrsync_core::StoreError;
use hrsync_events::EventError;
use hrsync_reconcile::SyncError;
use hrsync_tasks::TaskError;
use thiserror::Error;

/// `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Database operation errors.
///
/// # Example
///
/// ```rust
/// use hrsync_db::DbError;
///
/// fn handle_error(err: DbError) {
///     match err {
///         DbError::ConnectionFailed(e) => eprintln!("Cannot connect: {}", e),
///         DbError::MigrationFailed(e) => eprintln!("Migration error: {}", e),
///         DbError::QueryFailed(e) => eprintln!("Query error: {}", e),
///         DbError::NotFound(msg) => eprintln!("Not found: {}", msg),
///         DbError::ValidationFailed(msg) => eprintln!("Validation: {}", msg),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored row could not be turned back into a domain record.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl DbError {
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    #[must_use]
    pub fn is_migration_error(&self) -> bool {
        matches!(self, DbError::MigrationFailed(_))
    }

    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(self, DbError::QueryFailed(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    #[must_use]
    pub fn is_validation_failed(&self) -> bool {
        matches!(self, DbError::ValidationFailed(_))
    }

    /// Whether the failing statement hit a unique constraint.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::QueryFailed(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some(UNIQUE_VIOLATION)
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::ConnectionFailed(err)
            }
            other => DbError::QueryFailed(other),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => StoreError::NotFound {
                entity: "record",
                id: msg,
            },
            err if err.is_unique_violation() => StoreError::Conflict(err.to_string()),
            err => StoreError::backend(err.to_string()),
        }
    }
}

impl From<DbError> for TaskError {
    fn from(err: DbError) -> Self {
        TaskError::store(err.to_string())
    }
}

impl From<DbError> for EventError {
    fn from(err: DbError) -> Self {
        EventError::sink("postgres", err)
    }
}

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        SyncError::lock(err)
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_store_not_found() {
        let err: StoreError = DbError::NotFound("person 42".to_string()).into();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_connection_error());
        assert!(!err.is_query_error());
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_row_not_found_is_query_error() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(err.is_query_error());
        let store: StoreError = err.into();
        assert!(matches!(store, StoreError::Backend(_)));
    }

    #[test]
    fn test_validation_display() {
        let err = DbError::ValidationFailed("unknown status 'x'".to_string());
        assert_eq!(err.to_string(), "Validation failed: unknown status 'x'");
        assert!(err.is_validation_failed());
    }
}
