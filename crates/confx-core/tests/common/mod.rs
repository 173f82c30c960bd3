use std::sync::Arc;

use confx_core::value::map;
use confx_core::{
    shared, ChaChaEncrypter, ItemSpec, MemoryConfig, MemoryStorage, PersistentRepository,
    SharedConfig, Storage, StoredValues, Value,
};

/// Static configuration most tests start from
#[allow(dead_code)]
pub fn base_config() -> MemoryConfig {
    MemoryConfig::from_value(map([
        (
            "test",
            map([
                ("name", Value::from("Static Name")),
                ("title", Value::from("Static Title")),
            ]),
        ),
        ("app", map([("debug", Value::Bool(false))])),
    ]))
}

/// Repository over `base_config()` and a fresh `MemoryStorage`
#[allow(dead_code)]
pub fn repository_with<I, S>(items: I) -> (PersistentRepository, SharedConfig, Arc<MemoryStorage>)
where
    I: IntoIterator<Item = S>,
    S: Into<ItemSpec>,
{
    let store = shared(base_config());
    let storage = Arc::new(MemoryStorage::new());
    let mut repository = PersistentRepository::new(store.clone(), storage.clone());
    repository.set_items(items).unwrap();
    (repository, store, storage)
}

#[allow(dead_code)]
pub fn test_encrypter() -> Arc<ChaChaEncrypter> {
    Arc::new(ChaChaEncrypter::new("test", [42u8; 32]))
}

#[allow(dead_code)]
pub fn stored(pairs: &[(&str, Value)]) -> StoredValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[allow(dead_code)]
pub fn input(pairs: &[(&str, Value)]) -> confx_core::value::Map {
    stored(pairs)
}

#[allow(dead_code)]
pub fn storage_contents(storage: &dyn Storage) -> StoredValues {
    storage.get().unwrap()
}
