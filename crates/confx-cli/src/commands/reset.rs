//! Reset command
//!
//! Usage: confx reset [--key <KEY>]

use clap::Args;
use confx_store::Settings;

use super::{open_repository, CommandResult};

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Reset a single storage key instead of everything
    #[arg(short, long)]
    pub key: Option<String>,
}

/// Execute reset command
pub fn execute(settings: &Settings, args: ResetArgs) -> CommandResult {
    let repository = open_repository(settings)?;

    match args.key {
        Some(key) => {
            repository.reset_value(&key)?;
            println!("✓ Reset {}", key);
        }
        None => {
            repository.reset()?;
            println!("✓ Reset all persisted values");
        }
    }

    Ok(())
}
