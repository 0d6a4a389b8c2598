//! Database migrations

use clap::Args;

use hrsync_db::{run_migrations, DbPool};

use crate::config::AppConfig;
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct MigrateArgs {}

/// Apply pending migrations. Needs only the database, not the import setup.
pub async fn execute(_args: MigrateArgs, config: AppConfig) -> CliResult<()> {
    let pool = DbPool::connect_with(&config.database_url, 1).await?;
    run_migrations(&pool).await?;
    pool.close().await;
    println!("Migrations applied");
    Ok(())
}
