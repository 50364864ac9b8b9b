//! Key-value store contract for backend metadata.
//!
//! Values are JSON documents grouped by namespace (`"repository"`, ...).
//! Keys within a namespace list in sorted order.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ModelError {
    fn from(e: StoreError) -> Self {
        ModelError::OperationFailed(e.to_string())
    }
}

pub trait ObjectStore: Send + Sync {
    /// The value under `key`, or `None` when absent.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace.
    fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError>;

    /// Insert only when `key` is absent, atomically. Returns whether the
    /// value was stored.
    fn put_new(&self, namespace: &str, key: &str, value: Value) -> Result<bool, StoreError>;

    /// All keys of `namespace`, sorted.
    fn list(&self, namespace: &str) -> Result<Vec<String>, StoreError>;

    /// Remove `key`. Returns whether it existed.
    fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError>;
}

/// Typed read on top of [`ObjectStore::get`].
pub fn get_as<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    namespace: &str,
    key: &str,
) -> Result<Option<T>, StoreError> {
    store
        .get(namespace, key)?
        .map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::from)
}

/// Typed write on top of [`ObjectStore::put`].
pub fn put_as<T: Serialize>(
    store: &dyn ObjectStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.put(namespace, key, serde_json::to_value(value)?)
}

/// Typed insert-if-absent on top of [`ObjectStore::put_new`].
pub fn put_new_as<T: Serialize>(
    store: &dyn ObjectStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<bool, StoreError> {
    store.put_new(namespace, key, serde_json::to_value(value)?)
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn put_new(&self, namespace: &str, key: &str, value: Value) -> Result<bool, StoreError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        match data.entry(namespace.to_string()).or_default().entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
        }
    }

    fn list(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        Ok(data
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(key).is_some()))
    }
}
