//! In-memory storage backend for tests and ephemeral stores

use dashmap::DashMap;
use persistree_core::{PersistResult, Storage};
use std::sync::Arc;

/// In-memory key-value storage
#[derive(Default)]
pub struct MemoryStorage {
    items: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    pub fn with_items(items: Vec<(String, String)>) -> Self {
        let storage = Self::new();
        for (key, value) in items {
            storage.items.insert(key, value);
        }
        storage
    }

    /// Create a storage handle that can be shared across groups and stores
    pub fn shared() -> SharedMemoryStorage {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn clear(&self) {
        self.items.clear();
    }
}

impl Clone for MemoryStorage {
    fn clone(&self) -> Self {
        let copy = Self::new();
        for entry in self.items.iter() {
            copy.items.insert(entry.key().clone(), entry.value().clone());
        }
        copy
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> PersistResult<Option<String>> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> PersistResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> PersistResult<()> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> PersistResult<Vec<String>> {
        let mut keys: Vec<String> = self.items.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}

/// Thread-safe memory storage handle
pub type SharedMemoryStorage = Arc<MemoryStorage>;
