//! Set command
//!
//! Usage: confx set <ID> <VALUE>

use clap::Args;
use confx_core::value::Map;
use confx_core::Value;
use confx_store::Settings;

use super::{open_repository, CommandResult};

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Item id
    pub id: String,

    /// New value; parsed as JSON when possible, otherwise taken as a string
    pub value: String,
}

/// JSON when it parses, the raw text otherwise
pub fn parse_value(raw: &str) -> Value {
    Value::from_json(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Execute set command
pub fn execute(settings: &Settings, args: SetArgs) -> CommandResult {
    let repository = open_repository(settings)?;

    let Some(item) = repository.item(&args.id) else {
        return Err(format!("Unknown config item '{}'", args.id).into());
    };
    let key = item.key().to_string();

    let mut values = Map::new();
    values.insert(args.id.clone(), parse_value(&args.value));

    repository.validate(&values)?;
    repository.save(&values)?;

    println!("✓ Saved {} ({})", args.id, key);
    Ok(())
}
