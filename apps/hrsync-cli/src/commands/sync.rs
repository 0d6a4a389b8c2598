//! Full and differential sync runs

use clap::Args;
use tracing::info;

use hrsync_import::ImportMode;
use hrsync_reconcile::SyncReport;

use crate::commands::print_json;
use crate::context::AppContext;
use crate::error::{CliError, CliResult};

/// Arguments shared by `sync` and `diff-sync`
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Import source: `replay` (fixture files) or `live` (HR API)
    #[arg(long)]
    pub mode: Option<ImportMode>,

    /// Reconcile and enqueue only; leave processing to a worker
    #[arg(long)]
    pub no_process: bool,
}

impl SyncArgs {
    pub(crate) fn mode_or(&self, ctx: &AppContext) -> ImportMode {
        self.mode.unwrap_or(ctx.config.import_mode)
    }
}

/// Fail the command when the processing pass left failed tasks behind.
pub(crate) fn check_processing(report: &SyncReport) -> CliResult<()> {
    match &report.processing {
        Some(result) if !result.all_succeeded() => Err(CliError::TasksFailed {
            failed: result.failed,
            types: result.failed_types().join(", "),
        }),
        _ => Ok(()),
    }
}

pub async fn execute(args: SyncArgs, mut ctx: AppContext) -> CliResult<()> {
    let mode = args.mode_or(&ctx);
    if args.no_process {
        let mut config = ctx.runner.config().clone();
        config.process_after_reconcile = false;
        ctx.runner = ctx.runner.with_config(config);
    }

    let report = ctx.runner.execute_sync(mode).await?;
    info!(
        employees = report.employees,
        enqueued = report.reconciliation.total_enqueued(),
        "Sync finished"
    );
    print_json(&report)?;
    check_processing(&report)
}

pub async fn execute_diff(args: SyncArgs, ctx: AppContext) -> CliResult<()> {
    let report = ctx.runner.execute_diff_sync(args.mode_or(&ctx)).await?;
    print_json(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrsync_tasks::{BatchProcessingResult, TypeProcessingResult};

    #[test]
    fn test_failed_tasks_fail_the_command() {
        let mut report = SyncReport::default();
        assert!(check_processing(&report).is_ok());

        report.processing = Some(BatchProcessingResult {
            total: 3,
            succeeded: 2,
            failed: 1,
            skipped: 0,
            per_type: vec![TypeProcessingResult {
                name: "DB_EMPLOYEE_ADD".to_string(),
                total: 3,
                succeeded: 2,
                failed: 1,
                skipped: 0,
            }],
        });
        let err = check_processing(&report).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("DB_EMPLOYEE_ADD"));
    }
}
