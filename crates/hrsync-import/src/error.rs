//! Error types for the import adapter.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by credential stores.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Credential not present (or empty) in the store.
    #[error("Credential not found: '{name}'")]
    NotFound { name: String },

    /// Store unreachable or misconfigured.
    #[error("Credential store '{store}' unavailable: {detail}")]
    Unavailable { store: String, detail: String },
}

/// Import adapter errors.
///
/// Returned only for failures that make a whole category unusable. A single
/// institution that cannot be fetched is logged and skipped instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Storage directories could not be created or written.
    #[error("Storage error at {path}: {cause}")]
    Storage { path: PathBuf, cause: String },

    /// API credentials missing.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Bearer token exchange failed.
    #[error("Token exchange failed: {0}")]
    Token(String),

    /// Replay fixture missing for an institution.
    #[error("File not found: {}", path.display())]
    MissingFixture { path: PathBuf },

    /// Data endpoint answered with a non-success status.
    #[error("{category} endpoint returned {status} for institution {institution}")]
    UnexpectedStatus {
        category: String,
        institution: String,
        status: u16,
    },

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload could not be parsed.
    #[error("Invalid payload for {category} ({institution}): {cause}")]
    Parse {
        category: String,
        institution: String,
        cause: String,
    },

    /// Invalid adapter configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ImportError {
    pub fn storage(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::Storage {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    pub fn token(msg: impl Into<String>) -> Self {
        Self::Token(msg.into())
    }
}

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;
