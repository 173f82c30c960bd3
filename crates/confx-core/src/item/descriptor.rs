//! Item descriptors
//!
//! Descriptors are the externally supplied shape of an item definition. They
//! deserialize from settings files, so an item list can live next to the
//! rest of the configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigItem;
use crate::value::Value;

/// Unresolved item definition
///
/// Everything except `key` is optional; `ConfigItem::from_descriptor` fills
/// in the derived defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<String>>,
    #[serde(default)]
    pub cast: Option<String>,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl ItemDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }
}

/// One entry of an item list as written in a settings file: either a bare
/// key or a full descriptor table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ItemEntry {
    Key(String),
    Descriptor(ItemDescriptor),
}

/// Anything `PersistentRepository::set_items` accepts
#[derive(Debug)]
pub enum ItemSpec {
    /// Bare storage key, everything else derived
    Key(String),
    Descriptor(ItemDescriptor),
    /// Pre-built item, rebound on registration
    Item(ConfigItem),
}

impl From<&str> for ItemSpec {
    fn from(key: &str) -> Self {
        ItemSpec::Key(key.to_string())
    }
}

impl From<String> for ItemSpec {
    fn from(key: String) -> Self {
        ItemSpec::Key(key)
    }
}

impl From<ItemDescriptor> for ItemSpec {
    fn from(descriptor: ItemDescriptor) -> Self {
        ItemSpec::Descriptor(descriptor)
    }
}

/// `key => options` pair; the pair key is used when the descriptor has none
impl<K: Into<String>> From<(K, ItemDescriptor)> for ItemSpec {
    fn from((key, mut descriptor): (K, ItemDescriptor)) -> Self {
        if descriptor.key.is_none() {
            descriptor.key = Some(key.into());
        }
        ItemSpec::Descriptor(descriptor)
    }
}

impl From<ConfigItem> for ItemSpec {
    fn from(item: ConfigItem) -> Self {
        ItemSpec::Item(item)
    }
}

impl From<ItemEntry> for ItemSpec {
    fn from(entry: ItemEntry) -> Self {
        match entry {
            ItemEntry::Key(key) => ItemSpec::Key(key),
            ItemEntry::Descriptor(descriptor) => ItemSpec::Descriptor(descriptor),
        }
    }
}
