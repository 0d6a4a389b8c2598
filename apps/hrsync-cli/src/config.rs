//! Application configuration loaded from environment variables.
//!
//! Loading is fail-fast: `DATABASE_URL` must be present and every optional
//! `HRSYNC_*` override must parse, or the CLI exits with a clear message.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use hrsync_import::{ImportConfig, ImportMode};
use hrsync_reconcile::SyncConfig;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

const DEFAULT_LOG_FILTER: &str = "info,hrsync=debug";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 3600;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Settings of one CLI invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_filter: String,
    pub max_connections: u32,
    pub import_mode: ImportMode,
    pub import: ImportConfig,
    /// Pause between scheduled sync runs.
    pub sync_interval: Duration,
    /// Age after which a held run lock is taken over.
    pub lock_stale_after: Option<Duration>,
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or an override does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let mut import = ImportConfig::default();
        if let Some(root) = var("HRSYNC_STORAGE_ROOT") {
            import.storage_root = PathBuf::from(root);
        }
        if let Some(list) = var("HRSYNC_INSTITUTIONS") {
            import.institutions = parse_list(&list);
        }
        if let Some(year) = var("HRSYNC_SCHOOL_YEAR") {
            import.school_year = Some(year);
        }
        if let Some(url) = var("HRSYNC_IDENTITY_URL") {
            import.identity_url = url;
        }
        if let Some(url) = var("HRSYNC_EMPLOYEES_URL") {
            import.employees_url = url;
        }
        if let Some(url) = var("HRSYNC_ASSIGNMENTS_URL") {
            import.assignments_url = url;
        }
        if let Some(url) = var("HRSYNC_STUDENTS_URL") {
            import.students_url = url;
        }

        let import_mode = match var("HRSYNC_IMPORT_MODE") {
            Some(mode) => mode.parse().map_err(|message| ConfigError::InvalidValue {
                var: "HRSYNC_IMPORT_MODE".to_string(),
                message,
            })?,
            None => ImportMode::default(),
        };

        let max_connections = parse_number(&var, "HRSYNC_DB_MAX_CONNECTIONS")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let sync_interval = Duration::from_secs(
            parse_number(&var, "HRSYNC_SYNC_INTERVAL_SECS")?.unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
        );
        let lock_stale_after =
            parse_number::<u64, _>(&var, "HRSYNC_LOCK_STALE_SECS")?.map(Duration::from_secs);

        Ok(Self {
            database_url,
            log_filter: var("HRSYNC_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            max_connections,
            import_mode,
            import,
            sync_interval,
            lock_stale_after,
        })
    }

    /// Sync runner settings derived from the import settings.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::from_import(&self.import)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T, F>(var: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                var: name.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}
