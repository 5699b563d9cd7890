//! Core traits defining persistree interfaces
//!
//! Storage backends and state hosts are injected collaborators; the sync
//! engine only talks to them through these contracts.

use crate::types::*;
use std::sync::Arc;

/// Result type for persistree operations
pub type PersistResult<T> = Result<T, crate::error::PersistError>;

/// A string key-value storage backend.
///
/// Absent keys are `Ok(None)`, never an error. Implementations must complete
/// or fail synchronously within the call.
pub trait Storage: Send + Sync {
    /// Read the raw item stored under `key`
    fn get_item(&self, key: &str) -> PersistResult<Option<String>>;

    /// Store a raw item under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> PersistResult<()>;

    /// Remove the item under `key`; removing an absent key is not an error
    fn remove_item(&self, key: &str) -> PersistResult<()>;

    /// Enumerate every key currently held
    fn keys(&self) -> PersistResult<Vec<String>>;
}

/// Reads a stored snapshot from a backend
pub type GetStateFn = Arc<dyn Fn(&dyn Storage, &str) -> PersistResult<Option<StateTree>> + Send + Sync>;

/// Writes a snapshot to a backend
pub type SetStateFn = Arc<dyn Fn(&dyn Storage, &str, &StateTree) -> PersistResult<()> + Send + Sync>;

/// Removes a snapshot from a backend
pub type RemoveStateFn = Arc<dyn Fn(&dyn Storage, &str) -> PersistResult<()> + Send + Sync>;

/// Derives a storage key from a store id
pub type KeyFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Decode the JSON mapping stored under `key`
pub fn json_get_state(storage: &dyn Storage, key: &str) -> PersistResult<Option<StateTree>> {
    let raw = match storage.get_item(key)? {
        Some(raw) => raw,
        None => return Ok(None),
    };

    match serde_json::from_str(&raw)? {
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::Null => Ok(None),
        _ => Err(crate::error::PersistError::NotAMapping {
            key: key.to_string(),
        }),
    }
}

/// Encode `value` as JSON under `key`
pub fn json_set_state(storage: &dyn Storage, key: &str, value: &StateTree) -> PersistResult<()> {
    let raw = serde_json::to_string(value)?;
    storage.set_item(key, &raw)
}

/// Remove the raw item under `key`
pub fn json_remove_state(storage: &dyn Storage, key: &str) -> PersistResult<()> {
    storage.remove_item(key)
}

/// Callback invoked once per committed mutation, with the post-mutation state
pub type Listener = Arc<dyn Fn(&Mutation, &StateTree) -> PersistResult<()> + Send + Sync>;

/// Box a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Mutation, &StateTree) -> PersistResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The state owner the sync engine is attached to.
///
/// Hosts deliver change notifications synchronously, in registration order,
/// and return the first listener error to whoever committed the change.
/// Commits from different threads must be notified in commit order, and each
/// listener sees the state as it is when that listener runs.
pub trait StateHost: Send + Sync {
    /// Store identifier, used to derive storage keys
    fn id(&self) -> &str;

    /// Independent copy of the current state
    fn state(&self) -> StateTree;

    /// Deep-merge `partial` over the current state and notify listeners,
    /// reporting the change as `kind`
    fn patch_as(&self, partial: &StateTree, kind: MutationKind) -> PersistResult<()>;

    /// [`StateHost::patch_as`] with [`MutationKind::PatchObject`]
    fn patch(&self, partial: &StateTree) -> PersistResult<()> {
        self.patch_as(partial, MutationKind::PatchObject)
    }

    /// Register a change listener
    fn subscribe(&self, listener: Listener) -> SubscriptionId;

    /// Drop a listener; returns false if it was not registered
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapStorage(Mutex<HashMap<String, String>>);

    impl Storage for MapStorage {
        fn get_item(&self, key: &str) -> PersistResult<Option<String>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        fn set_item(&self, key: &str, value: &str) -> PersistResult<()> {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove_item(&self, key: &str) -> PersistResult<()> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }

        fn keys(&self) -> PersistResult<Vec<String>> {
            Ok(self.0.lock().unwrap().keys().cloned().collect())
        }
    }

    #[test]
    fn test_json_state_roundtrip() {
        let storage = MapStorage::default();
        assert!(json_get_state(&storage, "k").unwrap().is_none());

        let mut tree = StateTree::new();
        tree.insert("count".into(), serde_json::json!(1));
        json_set_state(&storage, "k", &tree).unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("{\"count\":1}"));
        assert_eq!(json_get_state(&storage, "k").unwrap(), Some(tree));

        json_remove_state(&storage, "k").unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_json_get_rejects_non_mapping() {
        let storage = MapStorage::default();
        storage.set_item("k", "[1,2]").unwrap();
        assert!(matches!(
            json_get_state(&storage, "k"),
            Err(crate::error::PersistError::NotAMapping { .. })
        ));

        storage.set_item("k", "null").unwrap();
        assert!(json_get_state(&storage, "k").unwrap().is_none());
    }
}
