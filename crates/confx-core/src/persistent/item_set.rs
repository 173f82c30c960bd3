use std::collections::HashMap;
use std::sync::OnceLock;

use crate::item::ConfigItem;

/// Ordered item registry with id and storage-key lookup
///
/// Ids are unique: registering an id again replaces the earlier item in
/// place. Storage keys should be unique too; when two items share one, key
/// lookup returns the one registered last.
#[derive(Debug, Default)]
pub struct ItemSet {
    items: Vec<ConfigItem>,
    by_id: HashMap<String, usize>,
    by_key: HashMap<String, usize>,
    keys: OnceLock<Vec<String>>,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: ConfigItem) {
        let index = match self.by_id.get(item.id()) {
            Some(&index) => {
                self.items[index] = item;
                index
            }
            None => {
                self.items.push(item);
                self.items.len() - 1
            }
        };
        let item = &self.items[index];
        self.by_id.insert(item.id().to_string(), index);
        self.rebuild_key_index();
        self.keys = OnceLock::new();
    }

    fn rebuild_key_index(&mut self) {
        self.by_key = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.key().to_string(), index))
            .collect();
    }

    pub fn by_id(&self, id: &str) -> Option<&ConfigItem> {
        self.by_id.get(id).map(|&index| &self.items[index])
    }

    pub fn by_key(&self, key: &str) -> Option<&ConfigItem> {
        self.by_key.get(key).map(|&index| &self.items[index])
    }

    /// Every item stored under `key`
    pub fn all_by_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ConfigItem> + 'a {
        self.items.iter().filter(move |item| item.key() == key)
    }

    /// Distinct storage keys in registration order, computed on first use
    pub fn keys(&self) -> &[String] {
        self.keys.get_or_init(|| {
            let mut seen = std::collections::HashSet::new();
            self.items
                .iter()
                .filter(|item| seen.insert(item.key()))
                .map(|item| item.key().to_string())
                .collect()
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigItem> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ConfigItem> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[ConfigItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a ItemSet {
    type Item = &'a ConfigItem;
    type IntoIter = std::slice::Iter<'a, ConfigItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
