//! Background task worker.
//!
//! Periodically drains the queue and releases tasks stuck in `processing`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use crate::processor::TaskProcessor;

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_stale_release_interval_secs() -> u64 {
    300
}

fn default_stale_after_secs() -> i64 {
    1800
}

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// How often to process pending tasks (in seconds).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How often to look for stale tasks (in seconds).
    #[serde(default = "default_stale_release_interval_secs")]
    pub stale_release_interval_secs: u64,

    /// Age after which a `processing` task counts as stale (in seconds).
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            stale_release_interval_secs: default_stale_release_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

/// Worker that processes the task queue on an interval.
pub struct TaskWorker {
    processor: Arc<TaskProcessor>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl TaskWorker {
    #[must_use]
    pub fn new(processor: Arc<TaskProcessor>, config: WorkerConfig) -> Self {
        Self {
            processor,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run until `shutdown` is called.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            "Starting task worker"
        );

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));
        let mut stale_interval = interval(Duration::from_secs(
            self.config.stale_release_interval_secs.max(1),
        ));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if self.is_shutdown() {
                        info!("Worker shutdown requested, stopping poll loop");
                        break;
                    }
                    self.process_pending().await;
                }
                _ = stale_interval.tick() => {
                    if self.is_shutdown() {
                        break;
                    }
                    self.release_stale_tasks().await;
                }
            }
        }

        info!("Worker stopped");
    }

    /// Request graceful shutdown; the current pass finishes first.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Shared flag, e.g. for a signal handler.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    async fn process_pending(&self) {
        match self.processor.process_all_pending().await {
            Ok(result) if result.total > 0 => {
                info!(
                    total = result.total,
                    failed = result.failed,
                    "Processed pending tasks"
                );
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Error processing pending tasks"),
        }
    }

    async fn release_stale_tasks(&self) {
        let older_than = chrono::Duration::seconds(self.config.stale_after_secs);
        match self.processor.queue().release_stale(older_than).await {
            Ok(count) if count > 0 => warn!(count = count, "Released stale tasks"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Failed to release stale tasks"),
        }
    }
}
