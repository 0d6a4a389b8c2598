//! Sync runner: fetch, reconcile, process.
//!
//! One run at a time, guarded by a [`RunLock`]. Setup failures (storage,
//! employee import, a pending blocking message) fail the whole run; the
//! caller retries on its next tick.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use hrsync_events::{codes, EventLog};
use hrsync_import::{ImportCategory, ImportConfig, ImportMode, ImportSource};
use hrsync_tasks::{BatchProcessingResult, TaskProcessor, MANUAL_ROLE};

use crate::engine::{ReconcileInput, ReconciliationEngine, ReconciliationReport};
use crate::error::{SyncError, SyncResult};
use crate::lock::{RunLock, SYNC_LOCK};

/// Timestamp format of the differential sync checkpoint.
pub const CHECKPOINT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage/sapimport")
}

fn default_checkpoint_file() -> String {
    "diffsync.checkpoint".to_string()
}

fn default_lock_holder() -> String {
    format!("hrsync-{}", std::process::id())
}

fn default_true() -> bool {
    true
}

/// Sync runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Institutions to import. Empty means every import-source organization.
    #[serde(default)]
    pub institutions: Vec<String>,

    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Differential sync checkpoint, relative to `storage_root`.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Identifies this process in the run lock.
    #[serde(default = "default_lock_holder")]
    pub lock_holder: String,

    /// Process the queue right after reconciling.
    #[serde(default = "default_true")]
    pub process_after_reconcile: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            institutions: Vec::new(),
            storage_root: default_storage_root(),
            checkpoint_file: default_checkpoint_file(),
            lock_holder: default_lock_holder(),
            process_after_reconcile: true,
        }
    }
}

impl SyncConfig {
    /// Institutions and storage root taken from the import configuration.
    #[must_use]
    pub fn from_import(config: &ImportConfig) -> Self {
        Self {
            institutions: config.institutions.clone(),
            storage_root: config.storage_root.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.storage_root.join(&self.checkpoint_file)
    }
}

/// Outcome of a full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub institutions: Vec<String>,
    pub employees: usize,
    /// `None` when assignments could not be fetched.
    pub assignments: Option<usize>,
    pub failed_institutions: Vec<String>,
    pub reconciliation: ReconciliationReport,
    pub processing: Option<BatchProcessingResult>,
}

/// Outcome of a differential sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSyncReport {
    /// Checkpoint the run started from.
    pub since: Option<String>,
    pub registrations: usize,
    pub students: usize,
    /// New checkpoint, `None` when the fetch was incomplete and the old one
    /// was kept.
    pub checkpoint: Option<String>,
}

/// Runs full and differential syncs.
pub struct SyncRunner {
    source: Arc<dyn ImportSource>,
    engine: Arc<ReconciliationEngine>,
    processor: Arc<TaskProcessor>,
    lock: Arc<dyn RunLock>,
    events: EventLog,
    config: SyncConfig,
}

impl SyncRunner {
    #[must_use]
    pub fn new(
        source: Arc<dyn ImportSource>,
        engine: Arc<ReconciliationEngine>,
        processor: Arc<TaskProcessor>,
        lock: Arc<dyn RunLock>,
        events: EventLog,
    ) -> Self {
        Self {
            source,
            engine,
            processor,
            lock,
            events,
            config: SyncConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn processor(&self) -> &Arc<TaskProcessor> {
        &self.processor
    }

    /// Full sync for today's date.
    pub async fn execute_sync(&self, mode: ImportMode) -> SyncResult<SyncReport> {
        self.execute_sync_on(mode, Local::now().date_naive()).await
    }

    /// Full sync with an explicit reference date for eligibility checks.
    #[instrument(skip(self))]
    pub async fn execute_sync_on(&self, mode: ImportMode, today: NaiveDate) -> SyncResult<SyncReport> {
        self.acquire().await?;
        let result = self.run_sync(mode, today).await;
        self.release().await;
        self.report_failure(&result, "Sync").await;
        result
    }

    /// Fetch registrations and students changed since the last checkpoint.
    #[instrument(skip(self))]
    pub async fn execute_diff_sync(&self, mode: ImportMode) -> SyncResult<DiffSyncReport> {
        self.acquire().await?;
        let result = self.run_diff_sync(mode).await;
        self.release().await;
        self.report_failure(&result, "Differential sync").await;
        result
    }

    async fn run_sync(&self, mode: ImportMode, today: NaiveDate) -> SyncResult<SyncReport> {
        self.events
            .record_event(codes::SYNC_INFO, format!("Start syncing employee information ({mode})"))
            .await;
        self.prepare().await?;

        let manual_roles = self.processor.queue().pending(MANUAL_ROLE).await?.len();
        if manual_roles > 0 {
            warn!(count = manual_roles, "Manual role tasks pending");
            self.events
                .record_event(
                    codes::SYNC_INFO,
                    format!("{manual_roles} manual role task(s) waiting for an operator"),
                )
                .await;
        }

        let institutions = self.institutions().await?;
        let employees = self
            .source
            .fetch(mode, ImportCategory::Employees, &institutions, None)
            .await?;

        let assignments = match self
            .source
            .fetch(mode, ImportCategory::EmployeeAssignments, &institutions, None)
            .await
        {
            Ok(batch) => {
                self.events
                    .record_event(codes::SYNC_INFO, format!("Loaded {} employee assignments", batch.len()))
                    .await;
                Some(batch)
            }
            Err(e) => {
                self.events
                    .record_error(codes::SYNC_ERROR, format!("Employee assignments unavailable: {e}"), false)
                    .await;
                None
            }
        };

        let input = ReconcileInput::new(employees, assignments);
        let reconciliation = self.engine.reconcile(&input, today).await?;

        let processing = if self.config.process_after_reconcile {
            Some(self.processor.process_all_pending().await?)
        } else {
            None
        };

        let report = SyncReport {
            employees: input.employees.len(),
            assignments: input.assignments.as_ref().map(|a| a.len()),
            failed_institutions: input.failed_institutions(),
            institutions,
            reconciliation,
            processing,
        };
        info!(
            employees = report.employees,
            enqueued = report.reconciliation.total_enqueued(),
            "Sync finished"
        );
        self.events
            .record_event(
                codes::SYNC_INFO,
                format!("Sync finished: {} task(s) created", report.reconciliation.total_enqueued()),
            )
            .await;
        Ok(report)
    }

    async fn run_diff_sync(&self, mode: ImportMode) -> SyncResult<DiffSyncReport> {
        let started = Local::now().format(CHECKPOINT_FORMAT).to_string();
        self.events
            .record_event(codes::SYNC_INFO, format!("Start differential sync ({mode})"))
            .await;
        self.prepare().await?;

        let since = self.read_checkpoint().await?;
        let institutions = self.institutions().await?;
        let registrations = self
            .source
            .fetch(mode, ImportCategory::Registrations, &institutions, since.as_deref())
            .await?;
        let students = self
            .source
            .fetch(mode, ImportCategory::Students, &institutions, since.as_deref())
            .await?;

        let checkpoint = if registrations.is_partial() || students.is_partial() {
            warn!("Differential import incomplete; checkpoint kept");
            None
        } else {
            self.write_checkpoint(&started).await?;
            Some(started)
        };

        self.events
            .record_event(codes::SYNC_INFO, "Differential sync completed")
            .await;
        Ok(DiffSyncReport {
            since,
            registrations: registrations.len(),
            students: students.len(),
            checkpoint,
        })
    }

    /// Storage and blocking-message checks shared by both run kinds.
    async fn prepare(&self) -> SyncResult<()> {
        self.source
            .ensure_storage()
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        if self.processor.queue().blocking_tasks_pending().await? {
            return Err(SyncError::Blocked);
        }
        Ok(())
    }

    async fn institutions(&self) -> SyncResult<Vec<String>> {
        if !self.config.institutions.is_empty() {
            return Ok(self.config.institutions.clone());
        }
        Ok(self.engine.directory().import_institutions().await?)
    }

    async fn read_checkpoint(&self) -> SyncResult<Option<String>> {
        match tokio::fs::read_to_string(self.config.checkpoint_path()).await {
            Ok(text) => {
                let text = text.trim();
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Storage(format!("reading checkpoint: {e}"))),
        }
    }

    async fn write_checkpoint(&self, checkpoint: &str) -> SyncResult<()> {
        tokio::fs::write(self.config.checkpoint_path(), checkpoint)
            .await
            .map_err(|e| SyncError::Storage(format!("writing checkpoint: {e}")))
    }

    async fn acquire(&self) -> SyncResult<()> {
        if self.lock.try_acquire(SYNC_LOCK, &self.config.lock_holder).await? {
            Ok(())
        } else {
            warn!(holder = %self.config.lock_holder, "Sync already running");
            Err(SyncError::AlreadyRunning)
        }
    }

    async fn release(&self) {
        if let Err(e) = self.lock.release(SYNC_LOCK, &self.config.lock_holder).await {
            warn!(error = %e, "Failed to release run lock");
        }
    }

    async fn report_failure<T>(&self, result: &SyncResult<T>, what: &str) {
        if let Err(e) = result {
            self.events
                .record_error(codes::SYNC_ERROR, format!("{what} failed: {e}"), false)
                .await;
        }
    }
}

impl std::fmt::Debug for SyncRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
