//! Dump command
//!
//! Usage: confx dump [--output <FILE>]
//!
//! Prints only the static configuration. Persisted values are left out so
//! the dump can serve as a cacheable baseline.

use clap::Args;
use std::path::PathBuf;

use confx_core::ConfigRepository;
use confx_store::Settings;

use super::{open_repository, to_pretty_json, CommandResult};

#[derive(Debug, Args)]
pub struct DumpArgs {
    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute dump command
pub fn execute(settings: &Settings, args: DumpArgs) -> CommandResult {
    let repository = open_repository(settings)?;

    let base = repository.repository().read().all();
    let json = to_pretty_json(&base)?;

    if let Some(output_path) = args.output {
        std::fs::write(&output_path, format!("{}\n", json))?;
        println!("✓ Dumped to {}", output_path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}
