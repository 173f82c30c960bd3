#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Lazy restore must only hit storage for keys on an item's dotted path, and
//! at most once per repository instance.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use confx_core::storage::{Storage, StoredValues};
use confx_core::{shared, ConfigError, ConfigRepository, PersistentRepository, Value};
use mockall::mock;

mock! {
    pub Backend {}

    impl Storage for Backend {
        fn save(&self, values: &StoredValues) -> confx_core::Result<bool>;
        fn get(&self) -> confx_core::Result<StoredValues>;
        fn clear(&self) -> confx_core::Result<bool>;
        fn clear_value(&self, key: &str) -> confx_core::Result<bool>;
    }
}

/// Repository over items `foo.name` and `bar.block`, whose storage expects
/// exactly `gets` reads
fn repository(gets: usize) -> PersistentRepository {
    let mut backend = MockBackend::new();
    backend
        .expect_get()
        .times(gets)
        .returning(|| Ok(common::stored(&[("foo.name", Value::from("restored"))])));

    let mut repository = PersistentRepository::new(shared(common::base_config()), Arc::new(backend));
    repository.set_items(["foo.name", "bar.block"]).unwrap();
    repository
}

#[test]
fn test_unrelated_keys_never_read_storage() {
    let mut repository = repository(0);

    for key in ["another", "foo.another", "bar-with-suffix", "foobar", "test.name"] {
        repository.get(key);
        repository.set(key, Value::Int(1));
        repository.push(&format!("{key}.list"), Value::Int(1));
    }

    assert!(!repository.is_restored());
}

#[test]
fn test_related_keys_read_storage_once() {
    for key in ["foo.name", "foo", "bar.block.nested"] {
        let repository = repository(1);

        repository.get(key);
        repository.get(key);
        repository.get("foo.name");
        repository.get("bar.block");

        assert!(repository.is_restored(), "key {} should restore", key);
    }
}

#[test]
fn test_restored_value_visible_through_ancestor() {
    let repository = repository(1);

    let foo = repository.get("foo").unwrap();

    assert_eq!(foo.as_map().unwrap()["name"], Value::from("restored"));
}

#[test]
fn test_write_to_related_key_restores_first() {
    let mut repository = repository(1);

    repository.set("bar.block", Value::from("written"));

    assert_eq!(repository.get("bar.block"), Some(Value::from("written")));
    assert_eq!(repository.get("foo.name"), Some(Value::from("restored")));
}

#[test]
fn test_get_many_restores_when_any_default_key_is_related() {
    let repository = repository(1);
    let mut defaults = BTreeMap::new();
    defaults.insert("another".to_string(), Value::Null);
    defaults.insert("foo.name".to_string(), Value::from("default"));

    let values = repository.get_many(&defaults);

    assert_eq!(values["foo.name"], Value::from("restored"));
    assert_eq!(values["another"], Value::Null);
}

#[test]
fn test_has_never_reads_storage() {
    let repository = repository(0);

    assert!(repository.has("foo.name"));
    assert!(repository.has("bar.block"));
    assert!(!repository.has("another"));
}

#[test]
fn test_all_reads_storage_once() {
    let repository = repository(1);

    repository.all();
    repository.all();
    repository.get("foo.name");
}

#[test]
fn test_storage_failure_degrades_to_static_values() {
    let mut backend = MockBackend::new();
    backend.expect_get().times(1).returning(|| {
        Err(ConfigError::Storage {
            op: "get".to_string(),
            message: "no such table: configs".to_string(),
        })
    });
    let mut repository = PersistentRepository::new(shared(common::base_config()), Arc::new(backend));
    repository.set_items(["test.name"]).unwrap();

    assert_eq!(repository.get("test.name"), Some(Value::from("Static Name")));
    assert!(repository.is_restored());
    assert_eq!(repository.get("test.name"), Some(Value::from("Static Name")));
}

#[test]
fn test_explicit_operations_propagate_storage_failure() {
    let mut backend = MockBackend::new();
    backend.expect_get().returning(|| {
        Err(ConfigError::Storage {
            op: "get".to_string(),
            message: "database is locked".to_string(),
        })
    });
    backend.expect_clear().returning(|| {
        Err(ConfigError::Storage {
            op: "clear".to_string(),
            message: "database is locked".to_string(),
        })
    });
    let mut repository = PersistentRepository::new(shared(common::base_config()), Arc::new(backend));
    repository.set_items(["test.name"]).unwrap();

    let mut values = BTreeMap::new();
    values.insert("test.name".to_string(), Value::from("X"));
    assert!(matches!(
        repository.save(&values),
        Err(ConfigError::Storage { .. })
    ));
    assert!(matches!(repository.gc(), Err(ConfigError::Storage { .. })));
    assert!(matches!(repository.reset(), Err(ConfigError::Storage { .. })));
}
