//! Append-only audit copies of fetched payloads.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::debug;

use crate::error::{ImportError, ImportResult};

/// Writes one timestamped file per category, institution and fetch.
#[derive(Debug, Clone)]
pub struct AuditWriter {
    dir: PathBuf,
}

impl AuditWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{prefix}-{institution}-{YYYYmmddHHMMSS}.json`.
    #[must_use]
    pub fn file_name<Tz: TimeZone>(prefix: &str, institution: &str, at: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        format!("{prefix}-{institution}-{}.json", at.format("%Y%m%d%H%M%S"))
    }

    /// Write `body` and return the file path.
    pub async fn write<Tz: TimeZone>(
        &self,
        prefix: &str,
        institution: &str,
        body: &str,
        at: &DateTime<Tz>,
    ) -> ImportResult<PathBuf>
    where
        Tz::Offset: std::fmt::Display,
    {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ImportError::storage(&self.dir, e))?;
        let path = self.dir.join(Self::file_name(prefix, institution, at));
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| ImportError::storage(&path, e))?;
        debug!(path = %path.display(), bytes = body.len(), "Wrote audit copy");
        Ok(path)
    }
}
