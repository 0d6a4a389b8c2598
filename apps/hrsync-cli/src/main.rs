//! hrsync - HR import reconciliation CLI
//!
//! Operators use this binary to:
//! - Run full and differential syncs against the HR source
//! - Process the task queue, once or as a background worker
//! - Inspect and repair queued tasks
//! - Apply database migrations

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod context;
mod error;
mod logging;

use config::AppConfig;
use context::AppContext;
use error::CliResult;

/// hrsync - HR import reconciliation
#[derive(Parser)]
#[command(name = "hrsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import employees and assignments, reconcile, and process the queue
    Sync(commands::sync::SyncArgs),

    /// Import student registrations changed since the last checkpoint
    DiffSync(commands::sync::SyncArgs),

    /// Process pending tasks
    Process(commands::tasks::ProcessArgs),

    /// Inspect and maintain the task queue
    Tasks(commands::tasks::TasksArgs),

    /// Run a sync on a fixed interval until interrupted
    Schedule(commands::schedule::ScheduleArgs),

    /// Process the queue in the background until interrupted
    Worker(commands::schedule::WorkerArgs),

    /// Apply pending database migrations
    Migrate(commands::migrate::MigrateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = AppConfig::from_env()?;
    logging::init_logging(&config.log_filter)?;

    if let Commands::Migrate(args) = cli.command {
        return commands::migrate::execute(args, config).await;
    }

    let ctx = AppContext::connect(config).await?;
    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args, ctx).await,
        Commands::DiffSync(args) => commands::sync::execute_diff(args, ctx).await,
        Commands::Process(args) => commands::tasks::execute_process(args, ctx).await,
        Commands::Tasks(args) => commands::tasks::execute(args, ctx).await,
        Commands::Schedule(args) => commands::schedule::execute(args, ctx).await,
        Commands::Worker(args) => commands::schedule::execute_worker(args, ctx).await,
        Commands::Migrate(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_by_type() {
        let cli = Cli::try_parse_from(["hrsync", "process", "--type", "DB_EMPLOYEE_ADD"]).unwrap();
        match cli.command {
            Commands::Process(args) => assert_eq!(args.task_type.as_deref(), Some("DB_EMPLOYEE_ADD")),
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_parse_sync_mode() {
        let cli = Cli::try_parse_from(["hrsync", "sync", "--mode", "live", "--no-process"]).unwrap();
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.mode, Some(hrsync_import::ImportMode::Live));
                assert!(args.no_process);
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn test_reset_requires_id() {
        assert!(Cli::try_parse_from(["hrsync", "tasks", "reset"]).is_err());
    }
}
