//! CLI subcommands

pub mod migrate;
pub mod schedule;
pub mod sync;
pub mod tasks;

use serde::Serialize;

use crate::error::CliResult;

/// Print a report as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
