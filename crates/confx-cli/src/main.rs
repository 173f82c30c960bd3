//! confx CLI
//!
//! Inspect and edit the persisted configuration overlay described by a
//! settings file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use confx_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "confx")]
#[command(about = "confx - persistent configuration overlay", long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = "confx.toml")]
    config: PathBuf,

    /// Emit JSON logs on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show persistent items with their current values, or one key's value
    Show(commands::show::ShowArgs),
    /// Validate and persist a value for one item
    Set(commands::set::SetArgs),
    /// Persist the current value of every item
    Sync(commands::sync::SyncArgs),
    /// Drop persisted values and fall back to static configuration
    Reset(commands::reset::ResetArgs),
    /// Remove persisted keys that no item declares
    Gc(commands::gc::GcArgs),
    /// Print the static configuration without persisted values
    Dump(commands::dump::DumpArgs),
}

fn main() {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init(if cli.json_logs {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = commands::load_settings(&cli.config).and_then(|settings| match cli.command {
        Commands::Show(args) => commands::show::execute(&settings, args),
        Commands::Set(args) => commands::set::execute(&settings, args),
        Commands::Sync(args) => commands::sync::execute(&settings, args),
        Commands::Reset(args) => commands::reset::execute(&settings, args),
        Commands::Gc(args) => commands::gc::execute(&settings, args),
        Commands::Dump(args) => commands::dump::execute(&settings, args),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
