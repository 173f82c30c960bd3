//! Dotted-path in-memory config store
//!
//! `MemoryConfig` keeps the whole configuration as a nested `Value` tree and
//! resolves `.`-delimited paths against it. It is the store that
//! `PersistentRepository` decorates.
//!
//! Path resolution rules:
//! - A top-level key that literally contains dots wins over traversal, so a
//!   flat `{"mail.host": ..}` entry is found by `get("mail.host")`
//! - Numeric segments index into lists
//! - `set` creates missing intermediate maps and overwrites scalars in the way
//! - `set` one past the end of a list appends; any other index or a named
//!   segment turns the list into a map keyed `"0".."n-1"` first

use crate::repository::ConfigRepository;
use crate::value::{Map, Value};

const SEPARATOR: char = '.';

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryConfig {
    items: Map,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a pre-loaded tree
    ///
    /// Non-map values have no addressable keys and produce an empty store.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Map(items) => Self { items },
            _ => Self::default(),
        }
    }

    pub fn from_map(items: Map) -> Self {
        Self { items }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.items.get(key) {
            return Some(value);
        }

        let mut segments = key.split(SEPARATOR);
        let first = segments.next()?;
        let mut current = self.items.get(first)?;
        for segment in segments {
            current = child(current, segment)?;
        }
        Some(current)
    }
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Map(map) => map.get(segment),
        Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Write `value` at the path made of `segments` below `target`
fn assign(target: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if let Value::List(items) = target {
        match head.parse::<usize>() {
            Ok(index) if index < items.len() => {
                assign(&mut items[index], rest, value);
                return;
            }
            Ok(index) if index == items.len() => {
                items.push(Value::Null);
                if let Some(slot) = items.last_mut() {
                    assign(slot, rest, value);
                }
                return;
            }
            // Sparse index or named key: the list becomes a map keyed by
            // position so existing elements survive
            _ => {
                let entries: Map = std::mem::take(items)
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), item))
                    .collect();
                *target = Value::Map(entries);
            }
        }
    }

    if !matches!(target, Value::Map(_)) {
        *target = Value::Map(Map::new());
    }
    if let Value::Map(map) = target {
        let slot = map.entry((*head).to_string()).or_insert(Value::Null);
        assign(slot, rest, value);
    }
}

/// Turn whatever sits at a key into a list ready for prepend/push
fn into_list(existing: Option<Value>) -> Vec<Value> {
    match existing {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::List(items)) => items,
        Some(other) => vec![other],
    }
}

impl ConfigRepository for MemoryConfig {
    fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key).cloned()
    }

    fn all(&self) -> Value {
        Value::Map(self.items.clone())
    }

    fn set(&mut self, key: &str, value: Value) {
        if let Some(slot) = self.items.get_mut(key) {
            *slot = value;
            return;
        }

        let segments: Vec<&str> = key.split(SEPARATOR).collect();
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        let slot = self.items.entry((*head).to_string()).or_insert(Value::Null);
        assign(slot, rest, value);
    }

    fn prepend(&mut self, key: &str, value: Value) {
        let mut list = into_list(self.get(key));
        list.insert(0, value);
        self.set(key, Value::List(list));
    }

    fn push(&mut self, key: &str, value: Value) {
        let mut list = into_list(self.get(key));
        list.push(value);
        self.set(key, Value::List(list));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::map;

    fn sample() -> MemoryConfig {
        MemoryConfig::from_value(map([
            (
                "mail",
                map([
                    ("host", Value::from("smtp.local")),
                    ("ports", Value::List(vec![Value::Int(25), Value::Int(587)])),
                ]),
            ),
            ("flat.key", Value::from("literal")),
        ]))
    }

    #[test]
    fn test_get_traverses_maps_and_lists() {
        let config = sample();
        assert_eq!(config.get("mail.host"), Some(Value::from("smtp.local")));
        assert_eq!(config.get("mail.ports.1"), Some(Value::Int(587)));
        assert_eq!(config.get("mail.ports.9"), None);
        assert_eq!(config.get("mail.host.deeper"), None);
    }

    #[test]
    fn test_literal_dotted_key_wins() {
        let mut config = sample();
        assert_eq!(config.get("flat.key"), Some(Value::from("literal")));

        config.set("flat.key", Value::from("updated"));
        assert_eq!(config.get("flat.key"), Some(Value::from("updated")));
        assert!(config.get("flat").is_none());
    }

    #[test]
    fn test_set_creates_and_overwrites_intermediates() {
        let mut config = sample();
        config.set("mail.host.name", Value::from("x"));
        assert_eq!(config.get("mail.host.name"), Some(Value::from("x")));

        config.set("cache.redis.port", Value::Int(6379));
        assert_eq!(config.get("cache.redis.port"), Some(Value::Int(6379)));
        assert!(config.has("cache.redis"));
    }

    #[test]
    fn test_set_into_list_index() {
        let mut config = sample();
        config.set("mail.ports.0", Value::Int(2525));
        assert_eq!(config.get("mail.ports.0"), Some(Value::Int(2525)));
        assert_eq!(config.get("mail.ports.1"), Some(Value::Int(587)));
    }

    #[test]
    fn test_set_past_list_end_appends() {
        let mut config = sample();
        config.set("mail.ports.2", Value::Int(465));
        assert_eq!(
            config.get("mail.ports"),
            Some(Value::List(vec![
                Value::Int(25),
                Value::Int(587),
                Value::Int(465)
            ]))
        );
    }

    #[test]
    fn test_set_sparse_index_keeps_list_elements() {
        let mut config = sample();
        config.set("mail.ports.5", Value::Int(2525));

        assert_eq!(config.get("mail.ports.0"), Some(Value::Int(25)));
        assert_eq!(config.get("mail.ports.1"), Some(Value::Int(587)));
        assert_eq!(config.get("mail.ports.5"), Some(Value::Int(2525)));
    }

    #[test]
    fn test_set_named_segment_keeps_list_elements() {
        let mut config = sample();
        config.set("mail.ports.default", Value::Int(25));

        assert_eq!(
            config.get("mail.ports"),
            Some(map([
                ("0", Value::Int(25)),
                ("1", Value::Int(587)),
                ("default", Value::Int(25)),
            ]))
        );
    }

    #[test]
    fn test_has_reports_null_values() {
        let mut config = MemoryConfig::new();
        config.set("app.optional", Value::Null);
        assert!(config.has("app.optional"));
        assert!(!config.has("app.missing"));
    }

    #[test]
    fn test_prepend_and_push() {
        let mut config = sample();
        config.push("mail.ports", Value::Int(465));
        config.prepend("mail.ports", Value::Int(1));
        assert_eq!(
            config.get("mail.ports"),
            Some(Value::List(vec![
                Value::Int(1),
                Value::Int(25),
                Value::Int(587),
                Value::Int(465)
            ]))
        );

        config.push("queue.names", Value::from("default"));
        assert_eq!(
            config.get("queue.names"),
            Some(Value::List(vec![Value::from("default")]))
        );

        config.prepend("mail.host", Value::from("primary"));
        assert_eq!(
            config.get("mail.host"),
            Some(Value::List(vec![
                Value::from("primary"),
                Value::from("smtp.local")
            ]))
        );
    }
}
