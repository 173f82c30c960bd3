//! Gc command
//!
//! Usage: confx gc

use clap::Args;
use confx_store::Settings;

use super::{open_repository, CommandResult};

#[derive(Debug, Args)]
pub struct GcArgs {}

/// Execute gc command
pub fn execute(settings: &Settings, _args: GcArgs) -> CommandResult {
    let repository = open_repository(settings)?;

    let removed = repository.gc()?;

    println!("✓ Removed {} obsolete keys", removed);
    Ok(())
}
