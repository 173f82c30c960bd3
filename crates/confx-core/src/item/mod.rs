//! Persisted config items
//!
//! A `ConfigItem` describes one configuration entry whose value lives in
//! durable storage: where it sits in the config tree (`key`), how it is named
//! to the outside world (`id`, `label`), how it is validated (`rules`) and how
//! its value is transformed on the way to and from storage (`cast`,
//! `encrypt`).
//!
//! Items read and write through a `SharedConfig` handle. The first write
//! after binding snapshots the value the store held before it, so
//! `reset_value` can put the static value back once a persisted override is
//! dropped.

pub mod cast;
pub mod descriptor;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::crypto::Encrypter;
use crate::errors::{ConfigError, Result};
use crate::repository::SharedConfig;
use crate::value::{Map, Value};

pub use cast::Cast;
pub use descriptor::{ItemDescriptor, ItemEntry, ItemSpec};

/// Default rule set for items that declare none
pub const DEFAULT_RULES: [&str; 2] = ["sometimes", "required"];

pub struct ConfigItem {
    id: String,
    key: String,
    label: String,
    hint: Option<String>,
    rules: Vec<String>,
    cast: Option<String>,
    encrypt: bool,
    options: BTreeMap<String, Value>,
    store: Option<SharedConfig>,
    encrypter: Option<Arc<dyn Encrypter>>,
    origin: Mutex<Option<Value>>,
}

impl ConfigItem {
    /// Item for `key` with every other attribute derived
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            label: derive_label(&key),
            id: key.clone(),
            key,
            hint: None,
            rules: DEFAULT_RULES.iter().map(|r| r.to_string()).collect(),
            cast: None,
            encrypt: false,
            options: BTreeMap::new(),
            store: None,
            encrypter: None,
            origin: Mutex::new(None),
        }
    }

    /// Build an item from a descriptor
    ///
    /// `id` defaults to `key`, `label` is derived from `id`, `rules` default
    /// to `["sometimes", "required"]`. The cast tag is stored as written and
    /// only checked when a value is serialized or restored.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` if the descriptor has no key.
    pub fn from_descriptor(descriptor: ItemDescriptor) -> Result<Self> {
        let key = descriptor
            .key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingKey {
                id: descriptor.id.clone(),
            })?;

        let mut item = Self::new(key);
        if let Some(id) = descriptor.id {
            item.label = derive_label(&id);
            item.id = id;
        }
        if let Some(label) = descriptor.label {
            item.label = label;
        }
        if let Some(rules) = descriptor.rules {
            item.rules = rules;
        }
        item.hint = descriptor.hint;
        item.cast = descriptor.cast;
        item.encrypt = descriptor.encrypt;
        item.options = descriptor.options;
        Ok(item)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules = rules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cast(mut self, cast: impl Into<String>) -> Self {
        self.cast = Some(cast.into());
        self
    }

    pub fn with_encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Cast tag as declared
    pub fn cast_tag(&self) -> Option<&str> {
        self.cast.as_deref()
    }

    pub fn encrypt(&self) -> bool {
        self.encrypt
    }

    pub fn options(&self) -> &BTreeMap<String, Value> {
        &self.options
    }

    pub fn is_bound(&self) -> bool {
        self.store.is_some()
    }

    /// Bind the item to a config store, dropping any origin snapshot
    pub fn bind(&mut self, store: SharedConfig) {
        self.store = Some(store);
        *self.origin.lock() = None;
    }

    pub fn set_encrypter(&mut self, encrypter: Option<Arc<dyn Encrypter>>) {
        self.encrypter = encrypter;
    }

    fn store(&self) -> Result<&SharedConfig> {
        self.store.as_ref().ok_or_else(|| ConfigError::UnboundRepository {
            key: self.key.clone(),
        })
    }

    /// Parsed cast, `None` when the item has no cast
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCast` for a tag outside the cast vocabulary.
    pub fn cast(&self) -> Result<Option<Cast>> {
        match &self.cast {
            None => Ok(None),
            Some(tag) => Cast::from_tag(tag)
                .map(Some)
                .ok_or_else(|| ConfigError::UnsupportedCast {
                    key: self.key.clone(),
                    cast: tag.clone(),
                }),
        }
    }

    fn encrypter(&self) -> Result<&Arc<dyn Encrypter>> {
        self.encrypter.as_ref().ok_or_else(|| ConfigError::Encryption {
            message: format!("no encrypter configured for item {}", self.key),
        })
    }

    /// Current value at the item's key, or `default` when absent
    ///
    /// # Errors
    ///
    /// Returns `UnboundRepository` if the item has no store.
    pub fn get_value(&self, default: Value) -> Result<Value> {
        Ok(self.store()?.read().get_or(&self.key, default))
    }

    /// Write `value` at the item's key
    ///
    /// The first write since binding (or since the last reset) records the
    /// value the store held before it.
    ///
    /// # Errors
    ///
    /// Returns `UnboundRepository` if the item has no store.
    pub fn set_value(&self, value: Value) -> Result<&Self> {
        let store = self.store()?;
        let mut guard = store.write();
        {
            let mut origin = self.origin.lock();
            if origin.is_none() {
                *origin = Some(guard.get_or(&self.key, Value::Null));
            }
        }
        guard.set(&self.key, value);
        Ok(self)
    }

    /// Apply `raw` to the store and return the form to hand to storage
    ///
    /// With a cast, containers are JSON-encoded; scalars and null pass
    /// through. With `encrypt`, the string form of the result is encrypted,
    /// except for null which is stored as null.
    ///
    /// # Errors
    ///
    /// Returns `UnboundRepository`, `UnsupportedCast`, or `Encryption`.
    pub fn save_value(&self, raw: Value) -> Result<Value> {
        let cast = self.cast()?;
        self.set_value(raw.clone())?;

        let serialized = match cast {
            Some(cast) => cast.encode(raw),
            None => raw,
        };

        if !self.encrypt || serialized.is_null() {
            return Ok(serialized);
        }

        let ciphertext = self
            .encrypter()?
            .encrypt_string(&serialized.to_plain_string())?;
        Ok(Value::String(ciphertext))
    }

    /// Inverse of `save_value`: decrypt, cast, write to the store
    ///
    /// # Errors
    ///
    /// Returns `Decryption` when the stored value is not valid ciphertext,
    /// `UnsupportedCast` or `Serialization` when it cannot be cast, and
    /// `UnboundRepository` if the item has no store. Nothing is written to
    /// the store on error.
    pub fn restore_value(&self, stored: Value) -> Result<Value> {
        let cast = self.cast()?;

        let decrypted = if self.encrypt {
            match stored {
                Value::Null => Value::Null,
                Value::String(ciphertext) => {
                    Value::String(self.decrypter()?.decrypt_string(&ciphertext)?)
                }
                other => {
                    return Err(ConfigError::Decryption {
                        message: format!(
                            "expected ciphertext string for {}, found {}",
                            self.key,
                            other.type_name()
                        ),
                    })
                }
            }
        } else {
            stored
        };

        let restored = match cast {
            Some(cast) => cast.decode(decrypted)?,
            None => decrypted,
        };

        self.set_value(restored.clone())?;
        Ok(restored)
    }

    fn decrypter(&self) -> Result<&Arc<dyn Encrypter>> {
        self.encrypter.as_ref().ok_or_else(|| ConfigError::Decryption {
            message: format!("no encrypter configured for item {}", self.key),
        })
    }

    /// Put back the value held before the first `set_value`, then forget it
    ///
    /// No-op when nothing was written since binding or the last reset.
    ///
    /// # Errors
    ///
    /// Returns `UnboundRepository` if the item has no store.
    pub fn reset_value(&self) -> Result<&Self> {
        let store = self.store()?;
        // Lock order matches set_value: store, then origin
        let mut guard = store.write();
        let origin = self.origin.lock().take();
        if let Some(origin) = origin {
            guard.set(&self.key, origin);
        }
        Ok(self)
    }

    /// Flattened descriptor with the current value, for presentation
    ///
    /// # Errors
    ///
    /// Returns `UnboundRepository` if the item has no store.
    pub fn to_map(&self) -> Result<Map> {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(self.id.as_str()));
        map.insert("key".to_string(), Value::from(self.key.as_str()));
        map.insert("label".to_string(), Value::from(self.label.as_str()));
        map.insert("hint".to_string(), Value::from(self.hint.clone()));
        map.insert(
            "rules".to_string(),
            Value::List(self.rules.iter().map(|r| Value::from(r.as_str())).collect()),
        );
        map.insert("cast".to_string(), Value::from(self.cast.clone()));
        map.insert("encrypt".to_string(), Value::Bool(self.encrypt));
        map.insert("options".to_string(), Value::Map(self.options.clone()));
        map.insert("value".to_string(), self.get_value(Value::Null)?);
        Ok(map)
    }
}

impl fmt::Debug for ConfigItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigItem")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("label", &self.label)
            .field("rules", &self.rules)
            .field("cast", &self.cast)
            .field("encrypt", &self.encrypt)
            .field("bound", &self.store.is_some())
            .finish()
    }
}

/// `mail.smtp-host_name` → `Mail Smtp Host Name`
pub fn derive_label(id: &str) -> String {
    id.replace(['.', '-', '_'], " ")
        .split(' ')
        .map(upper_first)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_config::MemoryConfig;
    use crate::repository::shared;
    use crate::value::map;

    fn bound(item: ConfigItem) -> (ConfigItem, SharedConfig) {
        let store = shared(MemoryConfig::new());
        let mut item = item;
        item.bind(store.clone());
        (item, store)
    }

    #[test]
    fn test_defaults_derived_from_key() {
        let item = ConfigItem::new("some.key");
        assert_eq!(item.id(), "some.key");
        assert_eq!(item.label(), "Some Key");
        assert_eq!(item.rules(), &["sometimes", "required"]);
        assert!(!item.is_bound());
    }

    #[test]
    fn test_label_follows_explicit_id() {
        let item = ConfigItem::from_descriptor(ItemDescriptor {
            key: Some("mail.host".to_string()),
            id: Some("smtp_host-name".to_string()),
            ..ItemDescriptor::default()
        })
        .unwrap();
        assert_eq!(item.id(), "smtp_host-name");
        assert_eq!(item.label(), "Smtp Host Name");
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = ConfigItem::from_descriptor(ItemDescriptor {
            id: Some("orphan".to_string()),
            ..ItemDescriptor::default()
        })
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingKey {
                id: Some("orphan".to_string())
            }
        );
    }

    #[test]
    fn test_unbound_access_fails() {
        let item = ConfigItem::new("app.name");
        assert!(matches!(
            item.get_value(Value::Null),
            Err(ConfigError::UnboundRepository { .. })
        ));
        assert!(matches!(
            item.set_value(Value::from("x")),
            Err(ConfigError::UnboundRepository { .. })
        ));
    }

    #[test]
    fn test_get_and_set_value() {
        let (item, store) = bound(ConfigItem::new("some.key"));
        assert_eq!(item.get_value(Value::Null).unwrap(), Value::Null);
        assert_eq!(item.get_value(Value::from("d")).unwrap(), Value::from("d"));

        item.set_value(Value::from("foo")).unwrap();
        assert_eq!(store.read().get("some.key"), Some(Value::from("foo")));
    }

    #[test]
    fn test_concurrent_set_and_reset_complete() {
        let (item, store) = bound(ConfigItem::new("some.key"));
        store.write().set("some.key", Value::from("static"));

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..20_000 {
                    item.set_value(Value::Int(i)).unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..20_000 {
                    item.reset_value().unwrap();
                }
            });
        });

        item.reset_value().unwrap();
        assert_eq!(store.read().get("some.key"), Some(Value::from("static")));
    }

    #[test]
    fn test_reset_restores_first_origin() {
        let (item, store) = bound(ConfigItem::new("some.key"));
        store.write().set("some.key", Value::from("static"));

        item.set_value(Value::from("first")).unwrap();
        item.set_value(Value::from("second")).unwrap();
        item.reset_value().unwrap();
        assert_eq!(store.read().get("some.key"), Some(Value::from("static")));

        store.write().set("some.key", Value::from("manual"));
        item.reset_value().unwrap();
        assert_eq!(store.read().get("some.key"), Some(Value::from("manual")));
    }

    #[test]
    fn test_rebinding_drops_snapshot() {
        let (mut item, store) = bound(ConfigItem::new("some.key"));
        item.set_value(Value::from("edited")).unwrap();

        item.bind(store.clone());
        item.reset_value().unwrap();
        assert_eq!(store.read().get("some.key"), Some(Value::from("edited")));
    }

    #[test]
    fn test_array_cast_round_trip() {
        let (item, store) = bound(ConfigItem::new("some.map").with_cast("array"));
        let value = map([("a", Value::Int(1))]);

        let stored = item.save_value(value.clone()).unwrap();
        assert_eq!(stored, Value::from(r#"{"a":1}"#));
        assert_eq!(store.read().get("some.map"), Some(value.clone()));

        store.write().set("some.map", Value::Null);
        assert_eq!(item.restore_value(stored).unwrap(), value);
        assert_eq!(store.read().get("some.map"), Some(value));
    }

    #[test]
    fn test_unsupported_cast_surfaces_at_use() {
        let (item, _store) = bound(ConfigItem::new("some.key").with_cast("decimal"));
        assert!(matches!(
            item.save_value(Value::Int(1)),
            Err(ConfigError::UnsupportedCast { .. })
        ));
        assert!(matches!(
            item.restore_value(Value::Int(1)),
            Err(ConfigError::UnsupportedCast { .. })
        ));
    }

    #[test]
    fn test_encrypt_without_encrypter_fails() {
        let (item, _store) = bound(ConfigItem::new("secret").with_encrypt(true));
        assert!(matches!(
            item.save_value(Value::from("x")),
            Err(ConfigError::Encryption { .. })
        ));
        assert_eq!(item.save_value(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_to_map_reads_fresh_value() {
        let (item, store) = bound(ConfigItem::new("some.key").with_hint("shown in forms"));
        store.write().set("some.key", Value::from("v1"));
        assert_eq!(item.to_map().unwrap()["value"], Value::from("v1"));

        store.write().set("some.key", Value::from("v2"));
        let map = item.to_map().unwrap();
        assert_eq!(map["value"], Value::from("v2"));
        assert_eq!(map["id"], Value::from("some.key"));
        assert_eq!(map["label"], Value::from("Some Key"));
        assert_eq!(map["hint"], Value::from("shown in forms"));
    }
}
