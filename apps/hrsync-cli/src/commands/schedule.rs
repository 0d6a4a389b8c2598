//! Scheduler loop and background worker

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use hrsync_reconcile::SyncError;
use hrsync_tasks::{TaskWorker, WorkerConfig};

use crate::commands::sync::{check_processing, SyncArgs};
use crate::context::AppContext;
use crate::error::CliResult;

/// Arguments for the schedule command
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub sync: SyncArgs,

    /// Seconds between runs (defaults to HRSYNC_SYNC_INTERVAL_SECS)
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Also run a differential student sync after each full sync
    #[arg(long)]
    pub with_diff: bool,
}

/// Arguments for the worker command
#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Seconds between processing passes
    #[arg(long, default_value = "30")]
    pub poll_secs: u64,

    /// Age in seconds after which a `processing` task is released to `error`
    #[arg(long, default_value = "1800")]
    pub stale_after_secs: i64,
}

/// Run a sync on every tick until Ctrl-C.
///
/// A failed run is logged and retried on the next tick; the loop itself only
/// stops on a shutdown signal.
pub async fn execute(args: ScheduleArgs, ctx: AppContext) -> CliResult<()> {
    let period = args
        .interval_secs
        .map_or(ctx.config.sync_interval, Duration::from_secs)
        .max(Duration::from_secs(1));
    let mode = args.sync.mode_or(&ctx);
    info!(interval_secs = period.as_secs(), mode = %mode, "Starting sync scheduler");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_once(&ctx, &args, mode).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping scheduler");
                break;
            }
        }
    }
    Ok(())
}

async fn run_once(ctx: &AppContext, args: &ScheduleArgs, mode: hrsync_import::ImportMode) {
    match ctx.runner.execute_sync(mode).await {
        Ok(report) => {
            if let Err(e) = check_processing(&report) {
                warn!(error = %e, "Scheduled sync finished with failed tasks");
            } else {
                info!(
                    enqueued = report.reconciliation.total_enqueued(),
                    "Scheduled sync finished"
                );
            }
        }
        Err(SyncError::AlreadyRunning) => warn!("Previous sync still running, skipping tick"),
        Err(SyncError::Blocked) => warn!("Sync blocked by pending blocking message"),
        Err(e) => error!(error = %e, "Scheduled sync failed"),
    }

    if args.with_diff {
        match ctx.runner.execute_diff_sync(mode).await {
            Ok(report) => info!(
                registrations = report.registrations,
                students = report.students,
                "Scheduled differential sync finished"
            ),
            Err(e) => error!(error = %e, "Scheduled differential sync failed"),
        }
    }
}

/// Process the queue on an interval until Ctrl-C.
pub async fn execute_worker(args: WorkerArgs, ctx: AppContext) -> CliResult<()> {
    let config = WorkerConfig {
        poll_interval_secs: args.poll_secs,
        stale_after_secs: args.stale_after_secs,
        ..WorkerConfig::default()
    };
    let worker = Arc::new(TaskWorker::new(Arc::clone(&ctx.processor), config));

    let signal_worker = Arc::clone(&worker);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_worker.shutdown();
        }
    });

    worker.run().await;
    Ok(())
}
