//! Config repository contract
//!
//! The shape shared by the plain in-memory store and the persistent
//! decorator, so either can be handed to code that reads configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::Value;

/// Dotted-path configuration store
///
/// Keys are `.`-delimited paths (`mail.smtp.host`). Implementations decide
/// how paths map onto nested values; `MemoryConfig` is the reference one.
pub trait ConfigRepository {
    /// Whether a value exists at `key`
    fn has(&self, key: &str) -> bool;

    /// Value at `key`, or `None` when absent
    fn get(&self, key: &str) -> Option<Value>;

    /// Whole configuration tree
    fn all(&self) -> Value;

    fn set(&mut self, key: &str, value: Value);

    /// Insert `value` at the front of the list at `key`
    fn prepend(&mut self, key: &str, value: Value);

    /// Append `value` to the list at `key`
    fn push(&mut self, key: &str, value: Value);

    /// Value at `key`, or `default` when absent
    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Look up several keys at once; missing keys take their default
    fn get_many(&self, defaults: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        defaults
            .iter()
            .map(|(key, default)| (key.clone(), self.get_or(key, default.clone())))
            .collect()
    }

    fn set_many(&mut self, values: BTreeMap<String, Value>) {
        for (key, value) in values {
            self.set(&key, value);
        }
    }
}

/// Shared handle to a config store
///
/// Items hold one of these so they can read and write the store the
/// repository wraps without owning it.
pub type SharedConfig = Arc<RwLock<dyn ConfigRepository + Send + Sync>>;

/// Wrap a store into a `SharedConfig`
pub fn shared<R>(repository: R) -> SharedConfig
where
    R: ConfigRepository + Send + Sync + 'static,
{
    Arc::new(RwLock::new(repository))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_config::MemoryConfig;

    #[test]
    fn test_get_many_fills_defaults() {
        let mut config = MemoryConfig::new();
        config.set("app.name", Value::from("confx"));

        let mut defaults = BTreeMap::new();
        defaults.insert("app.name".to_string(), Value::from("fallback"));
        defaults.insert("app.debug".to_string(), Value::Bool(false));

        let values = config.get_many(&defaults);
        assert_eq!(values["app.name"], Value::from("confx"));
        assert_eq!(values["app.debug"], Value::Bool(false));
    }

    #[test]
    fn test_shared_handle_sees_writes() {
        let handle = shared(MemoryConfig::new());
        handle.write().set("a.b", Value::Int(1));
        assert_eq!(handle.read().get("a.b"), Some(Value::Int(1)));
    }
}
