//! Show command
//!
//! Usage: confx show [KEY]

use clap::Args;
use confx_core::{ConfigRepository, Value};
use confx_store::Settings;

use super::{open_repository, to_pretty_json, CommandResult};

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Dotted config key; omit to list every persistent item
    pub key: Option<String>,
}

/// Execute show command
pub fn execute(settings: &Settings, args: ShowArgs) -> CommandResult {
    let repository = open_repository(settings)?;

    match args.key {
        Some(key) => {
            if !repository.has(&key) {
                return Err(format!("Config key '{}' is not set", key).into());
            }
            let value = repository.get(&key).unwrap_or_default();
            match value {
                Value::String(text) => println!("{}", text),
                other => println!("{}", to_pretty_json(&other)?),
            }
        }
        None => {
            repository.restore();
            let items = repository
                .items()
                .iter()
                .map(|item| item.to_map().map(Value::Map))
                .collect::<confx_core::Result<Vec<Value>>>()?;
            println!("{}", to_pretty_json(&Value::List(items))?);
        }
    }

    Ok(())
}
