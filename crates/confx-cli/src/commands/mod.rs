//! Subcommands
//!
//! Each command builds its own repository from the loaded settings.

use std::error::Error;
use std::path::Path;

use confx_core::{PersistentRepository, Value};
use confx_store::{build_repository, Settings};

pub mod dump;
pub mod gc;
pub mod reset;
pub mod set;
pub mod show;
pub mod sync;

pub type CommandResult = Result<(), Box<dyn Error>>;

pub fn load_settings(path: &Path) -> Result<Settings, Box<dyn Error>> {
    let settings = Settings::load(path)?;
    tracing::debug!(config = %path.display(), items = settings.items.len(), "settings loaded");
    Ok(settings)
}

pub fn open_repository(settings: &Settings) -> Result<PersistentRepository, Box<dyn Error>> {
    Ok(build_repository(settings)?)
}

/// Pretty JSON for terminal output
pub fn to_pretty_json(value: &Value) -> Result<String, Box<dyn Error>> {
    Ok(serde_json::to_string_pretty(value)?)
}
