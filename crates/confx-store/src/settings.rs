//! Layered settings
//!
//! A settings document (TOML, JSON or YAML, picked by file extension) is
//! loaded through the `config` crate and overridden by `CONFX__*` environment
//! variables, with `__` separating nested keys (`CONFX__CACHE__TTL_SECS=60`).
//! Relative paths inside the document resolve against its directory.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use confx_core::item::ItemEntry;
use confx_core::persistent::{DEFAULT_CACHE_KEY, DEFAULT_CACHE_TTL};
use confx_core::Value;
use serde::Deserialize;

use crate::errors::{settings_error, Result};
use crate::sqlite_storage::{SqliteOptions, DEFAULT_KEY_COLUMN, DEFAULT_TABLE, DEFAULT_VALUE_COLUMN};

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "CONFX";

/// Environment variable holding the encryption key when none is configured
pub const DEFAULT_KEY_ENV: &str = "CONFX_ENCRYPTION_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Static configuration files merged, in order, into the base store
    pub sources: Vec<PathBuf>,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub gc_enabled: bool,
    pub encryption: Option<EncryptionSettings>,
    /// Persistent items: bare keys or descriptor tables
    pub items: Vec<ItemEntry>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            storage: StorageSettings::default(),
            cache: CacheSettings::default(),
            gc_enabled: true,
            encryption: None,
            items: Vec::new(),
            base_dir: None,
        }
    }
}

/// Which storage backend persists item values
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum StorageSettings {
    /// Process-local, nothing survives a restart
    #[default]
    Memory,
    File {
        path: PathBuf,
    },
    Sqlite(SqliteSettings),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SqliteSettings {
    pub path: PathBuf,
    pub table: String,
    pub key_column: String,
    pub value_column: String,
    pub filter: BTreeMap<String, Value>,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("confx.db"),
            table: DEFAULT_TABLE.to_string(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            filter: BTreeMap::new(),
        }
    }
}

impl SqliteSettings {
    pub fn options(&self) -> SqliteOptions {
        SqliteOptions {
            table: self.table.clone(),
            key_column: self.key_column.clone(),
            value_column: self.value_column.clone(),
            filter: self.filter.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub key: String,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            key: DEFAULT_CACHE_KEY.to_string(),
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EncryptionSettings {
    /// Environment variable holding the base64 key
    pub key_env: String,
    /// Written into every ciphertext envelope
    pub key_id: String,
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        Self {
            key_env: DEFAULT_KEY_ENV.to_string(),
            key_id: "default".to_string(),
        }
    }
}

impl Settings {
    /// Load a settings file, then apply `CONFX__*` overrides
    ///
    /// # Errors
    ///
    /// `InvalidSettings` when the file is missing, malformed, or does not
    /// match the settings schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings: Settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(environment())
            .build()
            .map_err(settings_error)?
            .try_deserialize()
            .map_err(settings_error)?;

        settings.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        Ok(settings)
    }

    /// Resolve a path from the settings document against its directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.storage, StorageSettings::Memory);
        assert!(settings.gc_enabled);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.ttl_secs, 86_400);
        assert!(settings.encryption.is_none());
    }

    #[test]
    fn test_resolve_relative_to_base_dir() {
        let settings = Settings {
            base_dir: Some(PathBuf::from("/etc/confx")),
            ..Settings::default()
        };
        assert_eq!(
            settings.resolve(Path::new("var/confx.json")),
            PathBuf::from("/etc/confx/var/confx.json")
        );
        assert_eq!(
            settings.resolve(Path::new("/srv/confx.db")),
            PathBuf::from("/srv/confx.db")
        );
    }

    #[test]
    fn test_sqlite_settings_map_to_options() {
        let sqlite = SqliteSettings {
            table: "settings".to_string(),
            filter: [("scope".to_string(), Value::from("tenant-a"))]
                .into_iter()
                .collect(),
            ..SqliteSettings::default()
        };
        let options = sqlite.options();
        assert_eq!(options.table, "settings");
        assert_eq!(options.key_column, "key");
        assert_eq!(options.filter["scope"], Value::from("tenant-a"));
    }
}
