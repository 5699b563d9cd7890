//! Persistent storage backend using sled database
//!
//! Each named storage is a separate sled tree inside one database, so a
//! single directory can hold e.g. a `local` and a `session` storage.

use persistree_core::{PersistError, PersistResult, Storage, DEFAULT_STORAGE_NAME};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;

/// Storage backed by one tree of a sled database
pub struct SledStorage {
    db: Db,
    tree: Tree,
    name: String,
}

impl SledStorage {
    /// Open the database at `path` and use its default storage tree
    pub fn open<P: AsRef<Path>>(path: P) -> PersistResult<Self> {
        let db = open_db(path)?;
        Self::from_db(&db, DEFAULT_STORAGE_NAME)
    }

    /// Use the tree `name` of an already opened database
    pub fn from_db(db: &Db, name: &str) -> PersistResult<Self> {
        let tree = db.open_tree(name).map_err(storage_err)?;
        Ok(Self {
            db: db.clone(),
            tree,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of every storage tree in the database
    pub fn tree_names(&self) -> Vec<String> {
        storage_names(&self.db)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn flush(&self) -> PersistResult<()> {
        self.tree.flush().map(|_| ()).map_err(storage_err)
    }
}

impl Storage for SledStorage {
    fn get_item(&self, key: &str) -> PersistResult<Option<String>> {
        match self.tree.get(key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| PersistError::DeserializationError(e.to_string())),
            None => Ok(None),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> PersistResult<()> {
        self.tree
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(storage_err)?;
        self.flush()
    }

    fn remove_item(&self, key: &str) -> PersistResult<()> {
        self.tree.remove(key.as_bytes()).map_err(storage_err)?;
        self.flush()
    }

    fn keys(&self) -> PersistResult<Vec<String>> {
        self.tree
            .iter()
            .keys()
            .map(|key| {
                let key = key.map_err(storage_err)?;
                String::from_utf8(key.to_vec())
                    .map_err(|e| PersistError::DeserializationError(e.to_string()))
            })
            .collect()
    }
}

/// Open (or create) a sled database directory
pub fn open_db<P: AsRef<Path>>(path: P) -> PersistResult<Db> {
    sled::open(path).map_err(storage_err)
}

/// Names of the storage trees in `db`, skipping sled's internal trees
pub fn storage_names(db: &Db) -> Vec<String> {
    db.tree_names()
        .into_iter()
        .filter_map(|n| String::from_utf8(n.to_vec()).ok())
        .filter(|n| !n.starts_with("__sled__"))
        .collect()
}

fn storage_err(err: sled::Error) -> PersistError {
    PersistError::StorageError(err.to_string())
}

/// Thread-safe persistent storage handle
pub type SharedSledStorage = Arc<SledStorage>;

/// Create a shared sled storage for tree `name` of `db`
pub fn create_sled_storage(db: &Db, name: &str) -> PersistResult<SharedSledStorage> {
    Ok(Arc::new(SledStorage::from_db(db, name)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sled_storage_basic() {
        let tmp = TempDir::new().unwrap();
        let storage = SledStorage::open(tmp.path()).unwrap();

        storage.set_item("key1", "value1").unwrap();
        assert_eq!(storage.get_item("key1").unwrap(), Some("value1".to_string()));

        storage.remove_item("key1").unwrap();
        assert_eq!(storage.get_item("key1").unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_sled_storage_reopen() {
        let tmp = TempDir::new().unwrap();

        // Write data
        {
            let storage = SledStorage::open(tmp.path()).unwrap();
            storage.set_item("k", "{\"count\":1}").unwrap();
        }

        // Reopen and verify
        {
            let storage = SledStorage::open(tmp.path()).unwrap();
            assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("{\"count\":1}"));
            assert_eq!(storage.keys().unwrap(), vec!["k"]);
        }
    }

    #[test]
    fn test_named_trees_are_separate() {
        let tmp = TempDir::new().unwrap();
        let db = open_db(tmp.path()).unwrap();
        let local = create_sled_storage(&db, "local").unwrap();
        let session = create_sled_storage(&db, "session").unwrap();

        local.set_item("K", "1").unwrap();
        session.set_item("K", "2").unwrap();

        assert_eq!(local.get_item("K").unwrap().as_deref(), Some("1"));
        assert_eq!(session.get_item("K").unwrap().as_deref(), Some("2"));
        assert_eq!(session.name(), "session");

        let names = local.tree_names();
        assert!(names.contains(&"local".to_string()));
        assert!(names.contains(&"session".to_string()));
    }
}
