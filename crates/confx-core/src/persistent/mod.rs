//! Persistent config repository
//!
//! `PersistentRepository` decorates a config store so that a registered
//! subset of keys (the items) is backed by durable storage:
//!
//! - Persisted values are restored lazily, on the first read or write that
//!   touches an item key path, or on `all()`. Unrelated keys never reach
//!   storage, so the repository can be built before storage is reachable.
//! - `save` pushes new values through each item's cast and encryption
//!   policy into storage and refreshes the cache.
//! - `reset`, `reset_value` and `gc` drop persisted values again.
//!
//! ## Failure policy
//!
//! Restore never fails: a storage read error is logged and treated as an
//! empty set, and a value that cannot be decrypted or cast is logged and
//! skipped. Explicit operations (`save`, `synchronize`, `reset`,
//! `reset_value`, `gc`) propagate errors.
//!
//! ## Logging Ownership
//!
//! Explicit operations log `start`/`end`/`end_error` through the
//! `log_op_*` macros; swallowed restore failures log at error level.

pub mod item_set;
pub mod key_match;
pub mod validator;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::Cache;
use crate::crypto::Encrypter;
use crate::errors::{ConfigError, ExError, Result, ValidationErrors};
use crate::item::{upper_first, ConfigItem, ItemSpec};
use crate::repository::{ConfigRepository, SharedConfig};
use crate::storage::{Storage, StoredValues};
use crate::validation::{RuleValidator, ValidationEngine};
use crate::value::{Map, Value};
use crate::{log_op_end, log_op_error, log_op_start};

pub use item_set::ItemSet;
pub use validator::{escape_field, unescape_field, ItemValidator};

/// Default cache key for the persisted value set
pub const DEFAULT_CACHE_KEY: &str = "confx.persistent_repository";

/// Default cache lifetime: one day
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Lifecycle of a repository instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    /// No items registered yet
    Unconfigured,
    /// Items registered, persisted values not loaded
    Configured,
    /// Persisted values loaded into the wrapped store
    Restored,
}

pub struct PersistentRepository {
    repository: SharedConfig,
    storage: Arc<dyn Storage>,
    cache: Option<Arc<dyn Cache>>,
    encrypter: Option<Arc<dyn Encrypter>>,
    validator: Arc<dyn ValidationEngine>,
    items: ItemSet,
    configured: bool,
    cache_key: String,
    cache_ttl: Duration,
    gc_enabled: bool,
    restored: AtomicBool,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Log a failure that restore recovers from
fn log_swallowed(err: &ConfigError, config_key: Option<&str>, message: &str) {
    let ex: ExError = err.clone().into();
    tracing::error!(
        component = module_path!(),
        op = "restore",
        config_key = config_key.unwrap_or(""),
        err.kind = ?ex.kind(),
        err.code = ex.code(),
        error = %ex,
        "{}",
        message
    );
}

/// `str_replace` of the field token in raw, first-upper and upper forms
fn relabel(message: &str, field: &str, label: &str) -> String {
    message
        .replace(field, label)
        .replace(&upper_first(field), &upper_first(label))
        .replace(&field.to_uppercase(), &label.to_uppercase())
}

impl PersistentRepository {
    /// Decorate `repository` with persistence through `storage`
    ///
    /// No storage access happens here; the first relevant read or write
    /// triggers the restore.
    pub fn new(repository: SharedConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            repository,
            storage,
            cache: None,
            encrypter: None,
            validator: Arc::new(RuleValidator::new()),
            items: ItemSet::new(),
            configured: false,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            gc_enabled: true,
            restored: AtomicBool::new(false),
        }
    }

    // ========== Configuration ==========

    /// Replace the item set
    ///
    /// Accepts bare keys, `(key, descriptor)` pairs, descriptors and
    /// pre-built items. Every item is bound to the wrapped store and to the
    /// configured encrypter.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` if a descriptor has no key; the previous item
    /// set is kept in that case.
    pub fn set_items<I, S>(&mut self, specs: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemSpec>,
    {
        let mut items = ItemSet::new();
        for spec in specs {
            let mut item = match spec.into() {
                ItemSpec::Key(key) => ConfigItem::new(key),
                ItemSpec::Descriptor(descriptor) => ConfigItem::from_descriptor(descriptor)?,
                ItemSpec::Item(item) => item,
            };
            item.bind(self.repository.clone());
            item.set_encrypter(self.encrypter.clone());
            items.insert(item);
        }

        tracing::debug!(
            component = module_path!(),
            item_count = items.len() as u64,
            "item set replaced"
        );
        self.items = items;
        self.configured = true;
        Ok(self)
    }

    pub fn items(&self) -> &[ConfigItem] {
        self.items.as_slice()
    }

    pub fn item(&self, id: &str) -> Option<&ConfigItem> {
        self.items.by_id(id)
    }

    /// Distinct storage keys of the registered items
    pub fn item_keys(&self) -> &[String] {
        self.items.keys()
    }

    pub fn set_cache(&mut self, cache: Arc<dyn Cache>) -> &mut Self {
        self.cache = Some(cache);
        self
    }

    pub fn set_cache_key(&mut self, cache_key: impl Into<String>) -> &mut Self {
        self.cache_key = cache_key.into();
        self
    }

    pub fn set_cache_ttl(&mut self, cache_ttl: Duration) -> &mut Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Whether `save` garbage-collects orphaned storage keys
    pub fn set_gc_enabled(&mut self, gc_enabled: bool) -> &mut Self {
        self.gc_enabled = gc_enabled;
        self
    }

    /// Set the cipher for `encrypt` items, including those already registered
    pub fn set_encrypter(&mut self, encrypter: Arc<dyn Encrypter>) -> &mut Self {
        for item in self.items.iter_mut() {
            item.set_encrypter(Some(encrypter.clone()));
        }
        self.encrypter = Some(encrypter);
        self
    }

    pub fn set_validation_engine(&mut self, engine: Arc<dyn ValidationEngine>) -> &mut Self {
        self.validator = engine;
        self
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn gc_enabled(&self) -> bool {
        self.gc_enabled
    }

    /// The undecorated store
    pub fn repository(&self) -> &SharedConfig {
        &self.repository
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn state(&self) -> RepositoryState {
        if self.is_restored() {
            RepositoryState::Restored
        } else if self.configured {
            RepositoryState::Configured
        } else {
            RepositoryState::Unconfigured
        }
    }

    pub fn is_restored(&self) -> bool {
        self.restored.load(Ordering::Acquire)
    }

    /// Whether any of `keys` lies on the dotted path of an item key
    pub fn is_persistent_key<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        key_match::any_match(keys, self.items.keys())
    }

    fn restore_if_relevant<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.is_restored() && self.is_persistent_key(keys) {
            self.restore();
        }
    }

    // ========== Cache ==========

    fn cached(&self) -> Option<StoredValues> {
        self.cache.as_ref()?.get(&self.cache_key)
    }

    fn set_cached(&self, values: &StoredValues) {
        if let Some(cache) = &self.cache {
            cache.set(&self.cache_key, values, self.cache_ttl);
        }
    }

    fn delete_cached(&self) {
        if let Some(cache) = &self.cache {
            cache.delete(&self.cache_key);
        }
    }

    // ========== Persistence ==========

    /// Load persisted values into the wrapped store
    ///
    /// Reads the cache first and falls back to storage, caching what storage
    /// returned. Storage failures and per-key decrypt/cast failures are
    /// logged, never returned. Marks the repository restored.
    pub fn restore(&self) {
        log_op_start!("restore", cache_key = %self.cache_key);
        let start = Instant::now();

        let values = match self.cached() {
            Some(values) => values,
            None => match self.storage.get() {
                Ok(values) => {
                    self.set_cached(&values);
                    values
                }
                Err(err) => {
                    log_swallowed(&err, None, "persisted config unavailable, using static values");
                    StoredValues::new()
                }
            },
        };

        let mut applied = 0u64;
        for (key, value) in values {
            let Some(item) = self.items.by_key(&key) else {
                continue;
            };
            match item.restore_value(value) {
                Ok(_) => applied += 1,
                Err(err) => log_swallowed(&err, Some(&key), "persisted value skipped"),
            }
        }

        self.restored.store(true, Ordering::Release);
        log_op_end!("restore", duration_ms = elapsed_ms(start), value_count = applied);
    }

    /// Persist item values given by item id
    ///
    /// Unknown ids are ignored. The current stored set is read from storage
    /// (not the cache) and the new values are merged into it, so keys saved
    /// by other processes survive. The merged set is written, cached and,
    /// when gc is enabled, stripped of orphaned keys.
    ///
    /// # Errors
    ///
    /// Returns storage, cast and encryption errors. Values already applied to
    /// the wrapped store stay applied.
    pub fn save(&self, values: &Map) -> Result<()> {
        log_op_start!("save", value_count = values.len() as u64);
        let start = Instant::now();

        let saved = self.save_impl(values).map_err(|e| {
            log_op_error!("save", e.clone(), duration_ms = elapsed_ms(start));
            e
        })?;

        log_op_end!("save", duration_ms = elapsed_ms(start), item_count = saved);
        Ok(())
    }

    fn save_impl(&self, values: &Map) -> Result<u64> {
        let mut merged = self.storage.get()?;
        let mut saved = 0u64;
        for (id, raw) in values {
            let Some(item) = self.items.by_id(id) else {
                continue;
            };
            let stored = item.save_value(raw.clone())?;
            merged.insert(item.key().to_string(), stored);
            saved += 1;
        }

        self.storage.save(&merged)?;
        self.set_cached(&merged);

        if self.gc_enabled {
            self.gc()?;
        }
        Ok(saved)
    }

    /// Persist the value every item currently has in the wrapped store
    ///
    /// # Errors
    ///
    /// Same as `save`.
    pub fn synchronize(&self) -> Result<()> {
        log_op_start!("synchronize", item_count = self.items.len() as u64);
        let start = Instant::now();

        let result = self
            .items
            .iter()
            .map(|item| -> Result<(String, Value)> {
                Ok((item.id().to_string(), item.get_value(Value::Null)?))
            })
            .collect::<Result<Map>>()
            .and_then(|values| self.save(&values));

        if let Err(e) = &result {
            log_op_error!("synchronize", e.clone(), duration_ms = elapsed_ms(start));
            return result;
        }
        log_op_end!("synchronize", duration_ms = elapsed_ms(start));
        Ok(())
    }

    /// Drop every persisted value and put the static values back
    ///
    /// # Errors
    ///
    /// Returns storage errors; the cache entry is already gone by then.
    pub fn reset(&self) -> Result<()> {
        log_op_start!("reset");
        let start = Instant::now();

        self.reset_impl().map_err(|e| {
            log_op_error!("reset", e.clone(), duration_ms = elapsed_ms(start));
            e
        })?;

        log_op_end!("reset", duration_ms = elapsed_ms(start));
        Ok(())
    }

    fn reset_impl(&self) -> Result<()> {
        self.delete_cached();
        self.storage.clear()?;
        for item in &self.items {
            item.reset_value()?;
        }
        Ok(())
    }

    /// Drop the persisted value stored under `key` and put its static value
    /// back
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub fn reset_value(&self, key: &str) -> Result<()> {
        log_op_start!("reset_value", config_key = key);
        let start = Instant::now();

        self.reset_value_impl(key).map_err(|e| {
            log_op_error!(
                "reset_value",
                e.clone(),
                duration_ms = elapsed_ms(start),
                config_key = key
            );
            e
        })?;

        log_op_end!("reset_value", duration_ms = elapsed_ms(start), config_key = key);
        Ok(())
    }

    fn reset_value_impl(&self, key: &str) -> Result<()> {
        self.delete_cached();
        self.storage.clear_value(key)?;
        for item in self.items.all_by_key(key) {
            item.reset_value()?;
        }
        Ok(())
    }

    /// Delete stored keys that no registered item uses
    ///
    /// Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub fn gc(&self) -> Result<usize> {
        log_op_start!("gc");
        let start = Instant::now();

        let removed = self.gc_impl().map_err(|e| {
            log_op_error!("gc", e.clone(), duration_ms = elapsed_ms(start));
            e
        })?;

        log_op_end!("gc", duration_ms = elapsed_ms(start), value_count = removed as u64);
        Ok(removed)
    }

    fn gc_impl(&self) -> Result<usize> {
        let existing = self.storage.get()?;
        let mut removed = 0;
        for key in existing.keys() {
            if !self.items.contains_key(key) {
                self.storage.clear_value(key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ========== Validation ==========

    /// Validator for item input keyed by item id
    ///
    /// Rules and values are keyed by the escaped id (`.` becomes `->`) so an
    /// id with dots is one flat field. Input for unknown ids is passed along
    /// untouched; the engine ignores fields without rules.
    pub fn make_validator(&self, values: &Map) -> ItemValidator {
        let rules = self
            .items
            .iter()
            .map(|item| (escape_field(item.id()), item.rules().to_vec()))
            .collect();
        let values = values
            .iter()
            .map(|(id, value)| (escape_field(id), value.clone()))
            .collect();
        ItemValidator::new(self.validator.clone(), values, rules)
    }

    /// Validate item input keyed by item id
    ///
    /// On success returns the validated subset, keyed by item id.
    ///
    /// # Errors
    ///
    /// Returns `Validation` with messages keyed by item id, in which the
    /// field name is replaced by the item label. Returns `InvalidRule` for
    /// rules the engine does not know.
    pub fn validate(&self, values: &Map) -> Result<Map> {
        let outcome = self.make_validator(values).run()?;

        if outcome.fails() {
            let errors: BTreeMap<String, Vec<String>> = outcome
                .errors
                .into_iter()
                .map(|(field, messages)| {
                    let id = unescape_field(&field);
                    let label = self
                        .items
                        .by_id(&id)
                        .map(|item| item.label().to_string())
                        .unwrap_or_else(|| id.clone());
                    let messages: Vec<String> = messages
                        .iter()
                        .map(|message| relabel(message, &field, &label))
                        .collect();
                    (id, messages)
                })
                .collect();
            return Err(ConfigError::Validation(ValidationErrors::new(errors)));
        }

        Ok(outcome
            .validated
            .into_iter()
            .map(|(field, value)| (unescape_field(&field), value))
            .collect())
    }
}

impl fmt::Debug for PersistentRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentRepository")
            .field("items", &self.items.keys())
            .field("state", &self.state())
            .field("cache_key", &self.cache_key)
            .field("cache_ttl", &self.cache_ttl)
            .field("gc_enabled", &self.gc_enabled)
            .field("cached", &self.cache.is_some())
            .field("encrypted", &self.encrypter.is_some())
            .finish()
    }
}

impl ConfigRepository for PersistentRepository {
    /// True when the wrapped store has `key` or an item is stored under it.
    /// Does not trigger a restore.
    fn has(&self, key: &str) -> bool {
        self.repository.read().has(key) || self.items.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.restore_if_relevant([key]);
        self.repository.read().get(key)
    }

    fn all(&self) -> Value {
        if !self.is_restored() {
            self.restore();
        }
        self.repository.read().all()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.restore_if_relevant([key]);
        self.repository.write().set(key, value);
    }

    fn prepend(&mut self, key: &str, value: Value) {
        self.restore_if_relevant([key]);
        self.repository.write().prepend(key, value);
    }

    fn push(&mut self, key: &str, value: Value) {
        self.restore_if_relevant([key]);
        self.repository.write().push(key, value);
    }

    fn get_many(&self, defaults: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        self.restore_if_relevant(defaults.keys().map(String::as_str));
        self.repository.read().get_many(defaults)
    }

    fn set_many(&mut self, values: BTreeMap<String, Value>) {
        self.restore_if_relevant(values.keys().map(String::as_str));
        self.repository.write().set_many(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relabel_rewrites_all_forms() {
        assert_eq!(
            relabel("The test->name field is required.", "test->name", "Test Name"),
            "The Test Name field is required."
        );
        assert_eq!(
            relabel("Test->name is bad", "test->name", "site title"),
            "Site title is bad"
        );
        assert_eq!(
            relabel("TEST->NAME!", "test->name", "Site Title"),
            "SITE TITLE!"
        );
    }
}
