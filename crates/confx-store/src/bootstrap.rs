//! Repository wiring
//!
//! Turns `Settings` into a ready `PersistentRepository`: static sources form
//! the wrapped store, the configured backend persists item values, and the
//! cache, gc and encryption options are applied before items are registered.

#![allow(clippy::result_large_err)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use confx_core::storage::Storage;
use confx_core::{
    log_op_end, log_op_error, log_op_start, shared, ChaChaEncrypter, Encrypter, MemoryCache,
    MemoryConfig, MemoryStorage, PersistentRepository, Value,
};

use crate::errors::{settings_error, Result};
use crate::file_storage::FileStorage;
use crate::settings::{Settings, StorageSettings};
use crate::sqlite_storage::SqliteStorage;

/// Merge the static sources, in order, into one in-memory store
///
/// # Errors
///
/// `InvalidSettings` when a source is missing or malformed.
pub fn load_static_config(settings: &Settings) -> Result<MemoryConfig> {
    let mut builder = config::Config::builder();
    for source in &settings.sources {
        builder = builder.add_source(config::File::from(settings.resolve(source)));
    }
    let merged: serde_json::Value = builder
        .build()
        .map_err(settings_error)?
        .try_deserialize()
        .map_err(settings_error)?;
    Ok(MemoryConfig::from_value(Value::from(merged)))
}

/// Open the configured storage backend
///
/// # Errors
///
/// Storage errors from opening or migrating a SQLite database, and
/// `InvalidSettings` for bad table or column names.
pub fn build_storage(settings: &Settings) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match &settings.storage {
        StorageSettings::Memory => Arc::new(MemoryStorage::new()),
        StorageSettings::File { path } => Arc::new(
            FileStorage::new(settings.resolve(path)).with_invalidation_hook(|path| {
                tracing::debug!(path = %path.display(), "storage file rewritten");
            }),
        ),
        StorageSettings::Sqlite(sqlite) => Arc::new(SqliteStorage::open(
            settings.resolve(&sqlite.path),
            sqlite.options(),
        )?),
    };
    Ok(storage)
}

/// Load the encrypter named by the settings, if any
///
/// # Errors
///
/// `InvalidSettings` when the key variable is unset or not a 32-byte key.
pub fn build_encrypter(settings: &Settings) -> Result<Option<Arc<dyn Encrypter>>> {
    match &settings.encryption {
        Some(encryption) => {
            let encrypter = ChaChaEncrypter::from_env(&encryption.key_env, encryption.key_id.clone())?;
            Ok(Some(Arc::new(encrypter)))
        }
        None => Ok(None),
    }
}

/// Build a persistent repository from settings
///
/// The repository is not restored; the first relevant read does that.
///
/// # Errors
///
/// Settings, storage and encryption-key errors, and `MissingKey` for an item
/// descriptor without a key.
pub fn build_repository(settings: &Settings) -> Result<PersistentRepository> {
    log_op_start!("bootstrap", item_count = settings.items.len() as u64);
    let start = Instant::now();

    let repository = build_repository_impl(settings).map_err(|e| {
        log_op_error!(
            "bootstrap",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "bootstrap",
        duration_ms = start.elapsed().as_millis() as u64
    );
    Ok(repository)
}

fn build_repository_impl(settings: &Settings) -> Result<PersistentRepository> {
    let store = shared(load_static_config(settings)?);
    let storage = build_storage(settings)?;

    let mut repository = PersistentRepository::new(store, storage);
    if settings.cache.enabled {
        repository
            .set_cache(Arc::new(MemoryCache::new()))
            .set_cache_key(settings.cache.key.clone())
            .set_cache_ttl(Duration::from_secs(settings.cache.ttl_secs));
    }
    repository.set_gc_enabled(settings.gc_enabled);
    if let Some(encrypter) = build_encrypter(settings)? {
        repository.set_encrypter(encrypter);
    }
    repository.set_items(settings.items.iter().cloned())?;

    Ok(repository)
}
