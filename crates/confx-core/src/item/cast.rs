//! Value casting for persisted items
//!
//! Storage holds flat scalars. A cast tag tells an item how to turn a stored
//! scalar back into the typed value the application expects, and lets
//! containers travel through storage as JSON text.

use std::fmt;
use std::str::FromStr;

use crate::errors::{ConfigError, Result};
use crate::value::Value;

/// Closed set of serialization strategies
///
/// The external tag vocabulary accepts the usual aliases: `int`/`integer`,
/// `float`/`double`, `bool`/`boolean`, and `array`/`json` for list or map
/// payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Int,
    Float,
    String,
    Bool,
    Object,
    Array,
}

impl Cast {
    /// Parse a cast tag, `None` for tags outside the vocabulary
    pub fn from_tag(tag: &str) -> Option<Cast> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(Cast::Int),
            "float" | "double" | "real" => Some(Cast::Float),
            "string" => Some(Cast::String),
            "bool" | "boolean" => Some(Cast::Bool),
            "object" => Some(Cast::Object),
            "array" | "json" => Some(Cast::Array),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Cast::Int => "int",
            Cast::Float => "float",
            Cast::String => "string",
            Cast::Bool => "bool",
            Cast::Object => "object",
            Cast::Array => "array",
        }
    }

    /// Storage form of a value
    ///
    /// Null and scalars pass through untouched; lists and maps become JSON
    /// strings.
    pub fn encode(&self, value: Value) -> Value {
        if value.is_scalar() {
            value
        } else {
            Value::String(value.to_json())
        }
    }

    /// Typed form of a stored value. Null stays null under every cast.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` when the stored value cannot be read as the
    /// target type (for example `"abc"` under `int`, or malformed JSON).
    pub fn decode(&self, stored: Value) -> Result<Value> {
        if stored.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Cast::Int => to_int(&stored).map(Value::Int),
            Cast::Float => to_float(&stored).map(Value::Float),
            Cast::String => Ok(Value::String(stored.to_plain_string())),
            Cast::Bool => Ok(Value::Bool(to_bool(&stored))),
            Cast::Object | Cast::Array => match stored {
                Value::String(text) => Value::from_json(&text).map_err(ConfigError::from),
                other => Ok(other),
            },
        }
    }
}

impl FromStr for Cast {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Cast::from_tag(s).ok_or_else(|| format!("unsupported cast '{}'", s))
    }
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn cast_error(value: &Value, target: &str) -> ConfigError {
    ConfigError::Serialization {
        message: format!("cannot cast {} value '{}' to {}", value.type_name(), value, target),
    }
}

fn to_int(value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .ok_or_else(|| cast_error(value, "int"))
        }
        _ => Err(cast_error(value, "int")),
    }
}

fn to_float(value: &Value) -> Result<f64> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| cast_error(value, "float")),
        _ => Err(cast_error(value, "float")),
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "off" | "no"
        ),
        Value::List(items) => !items.is_empty(),
        Value::Map(map) => !map.is_empty(),
    }
}
