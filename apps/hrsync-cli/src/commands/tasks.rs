//! Task processing and queue maintenance commands

use clap::{Args, Subcommand};
use serde_json::json;

use hrsync_core::TaskId;
use hrsync_tasks::TaskTriple;

use crate::commands::print_json;
use crate::context::AppContext;
use crate::error::{CliError, CliResult};

/// Arguments for the process command
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Only process this task type (e.g. DB_EMPLOYEE_ADD)
    #[arg(long = "type", value_name = "TYPE", conflicts_with = "task")]
    pub task_type: Option<String>,

    /// Only process this task (UUID)
    #[arg(long)]
    pub task: Option<String>,
}

/// Queue maintenance commands
#[derive(Args, Debug)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: TasksCommands,
}

#[derive(Subcommand, Debug)]
pub enum TasksCommands {
    /// Show task counts per status
    Stats,
    /// Move one error task back to new
    Reset(ResetArgs),
    /// Move every error task with retries left back to new
    ResetErrors(TypeFilterArgs),
    /// Archive pending tasks so they are never processed
    CancelPending(TypeFilterArgs),
    /// Move tasks stuck in processing to error
    ReleaseStale(ReleaseStaleArgs),
    /// Create the standard task types
    SeedTypes,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Task ID (UUID)
    pub id: String,

    /// Reset even when the task used all its retries
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct TypeFilterArgs {
    /// Restrict to one task type (e.g. DB_EMPLOYEE_ADD)
    #[arg(long = "type", value_name = "TYPE")]
    pub task_type: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReleaseStaleArgs {
    /// Minimum age in seconds of a processing task
    #[arg(long, default_value = "1800")]
    pub older_than_secs: i64,
}

fn parse_triple(raw: &str) -> CliResult<TaskTriple> {
    raw.parse().map_err(CliError::Validation)
}

fn parse_task_id(raw: &str) -> CliResult<TaskId> {
    raw.parse()
        .map_err(|e: hrsync_core::ParseIdError| CliError::Validation(e.to_string()))
}

fn parse_optional_triple(raw: Option<&str>) -> CliResult<Option<TaskTriple>> {
    raw.map(parse_triple).transpose()
}

/// Execute the process command
pub async fn execute_process(args: ProcessArgs, ctx: AppContext) -> CliResult<()> {
    let processor = &ctx.processor;

    if let Some(raw) = args.task.as_deref() {
        let outcome = processor.process_task(parse_task_id(raw)?).await?;
        return print_json(&json!({ "task": raw, "outcome": format!("{outcome:?}") }));
    }

    if let Some(raw) = args.task_type.as_deref() {
        let result = processor.process_by_type(parse_triple(raw)?).await?;
        print_json(&result)?;
        return if result.failed > 0 {
            Err(CliError::TasksFailed {
                failed: result.failed,
                types: result.name,
            })
        } else {
            Ok(())
        };
    }

    let result = processor.process_all_pending().await?;
    print_json(&result)?;
    if result.all_succeeded() {
        Ok(())
    } else {
        Err(CliError::TasksFailed {
            failed: result.failed,
            types: result.failed_types().join(", "),
        })
    }
}

/// Execute queue maintenance commands
pub async fn execute(args: TasksArgs, ctx: AppContext) -> CliResult<()> {
    let queue = &ctx.queue;
    match args.command {
        TasksCommands::Stats => print_json(&queue.statistics().await?),
        TasksCommands::Reset(reset) => {
            let id = parse_task_id(&reset.id)?;
            let task = if reset.force {
                queue.force_reset_task(id).await?
            } else {
                queue.reset_task(id).await?
            };
            print_json(&json!({
                "task": task.id,
                "name": task.name,
                "status": task.status,
                "retryCount": task.retry_count,
            }))
        }
        TasksCommands::ResetErrors(filter) => {
            let triple = parse_optional_triple(filter.task_type.as_deref())?;
            print_json(&queue.reset_error_tasks(triple).await?)
        }
        TasksCommands::CancelPending(filter) => {
            let triple = parse_optional_triple(filter.task_type.as_deref())?;
            let cancelled = queue.cancel_pending(triple).await?;
            print_json(&json!({ "cancelled": cancelled }))
        }
        TasksCommands::ReleaseStale(stale) => {
            let released = queue
                .release_stale(chrono::Duration::seconds(stale.older_than_secs))
                .await?;
            print_json(&json!({ "released": released }))
        }
        TasksCommands::SeedTypes => {
            let created = queue.registry().ensure_standard_types().await?;
            print_json(&json!({ "created": created }))
        }
    }
}
