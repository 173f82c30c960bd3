//! Sync command
//!
//! Usage: confx sync

use clap::Args;
use confx_store::Settings;

use super::{open_repository, CommandResult};

#[derive(Debug, Args)]
pub struct SyncArgs {}

/// Execute sync command
pub fn execute(settings: &Settings, _args: SyncArgs) -> CommandResult {
    let repository = open_repository(settings)?;

    repository.restore();
    repository.synchronize()?;

    println!("✓ Synchronized {} items", repository.items().len());
    Ok(())
}
