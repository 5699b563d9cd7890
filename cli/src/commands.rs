//! CLI Commands

use anyhow::{anyhow, Context};
use persistree_core::{
    PersistResult, PersistedSetting, PluginOptions, PropPath, StateHost, StateTree, Storage,
    DEFAULT_STORAGE_NAME,
};
use persistree_state::{
    create_sled_storage, open_db, reduce_state, storage_names, PersistPlugin, Store,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A sled database directory holding one tree per named storage
pub struct StorageDir {
    db: sled::Db,
}

impl StorageDir {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let db = open_db(path).with_context(|| format!("opening storage at {}", path.display()))?;
        Ok(Self { db })
    }

    /// Storage backend for a name; names map to sled trees
    pub fn storage(&self, name: &str) -> PersistResult<Arc<dyn Storage>> {
        Ok(create_sled_storage(&self.db, name)?)
    }

    /// Every storage name present in the directory
    pub fn storage_names(&self) -> Vec<String> {
        storage_names(&self.db)
    }

    pub fn keys(&self, storage: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.storage(storage)?.keys()?)
    }

    /// Stored item, pretty-printed when it is JSON
    pub fn show(&self, storage: &str, key: &str) -> anyhow::Result<Option<String>> {
        let raw = match self.storage(storage)?.get_item(key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        Ok(Some(match serde_json::from_str::<Value>(&raw) {
            Ok(value) => serde_json::to_string_pretty(&value)?,
            Err(_) => raw,
        }))
    }

    pub fn remove(&self, storage: &str, key: &str) -> anyhow::Result<bool> {
        let storage = self.storage(storage)?;
        let existed = storage.get_item(key)?.is_some();
        storage.remove_item(key)?;
        Ok(existed)
    }

    /// Plugin whose default storage is the `local` tree
    pub fn plugin(&self) -> PersistResult<PersistPlugin> {
        let storage = self.storage(DEFAULT_STORAGE_NAME)?;
        Ok(PersistPlugin::new(PluginOptions::new().storage(storage)))
    }

    /// Create a store from `state` and attach persistence per `setting`;
    /// a disabled setting leaves the store detached from storage
    pub fn attach(&self, id: &str, state: StateTree, setting: PersistedSetting) -> anyhow::Result<Arc<Store>> {
        let persisted = setting.into_persisted(|name| self.storage(name))?;
        let store = Arc::new(Store::new(id, state));
        let engine = self.plugin()?.attach(&store, persisted)?;
        debug!(store = id, persisted = engine.is_some(), "Store attached");
        Ok(store)
    }

    /// State after restoring from storage over the defaults in `state`
    pub fn restore(&self, id: &str, state: StateTree, setting: PersistedSetting) -> anyhow::Result<StateTree> {
        Ok(self.attach(id, state, setting)?.state())
    }

    /// Apply `state` as a mutation, persisting the configured paths
    pub fn commit(&self, id: &str, state: StateTree, setting: PersistedSetting) -> anyhow::Result<StateTree> {
        let store = self.attach(id, state.clone(), setting)?;
        store.patch(&state)?;
        Ok(store.state())
    }

    /// Restore, then roll `paths` (or everything) back to the defaults in `state`
    pub fn hydrate(
        &self,
        id: &str,
        state: StateTree,
        setting: PersistedSetting,
        paths: &[String],
    ) -> anyhow::Result<StateTree> {
        let store = self.attach(id, state, setting)?;
        if paths.is_empty() {
            store.hydrate(None)?;
        } else {
            let paths = PropPath::parse_all(paths)?;
            store.hydrate(Some(paths.as_slice()))?;
        }
        Ok(store.state())
    }
}

/// Load a JSON object from a file
pub fn load_state(path: &Path) -> anyhow::Result<StateTree> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading state file {}", path.display()))?;
    match serde_json::from_str(&content)? {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("state file {} must hold a JSON object", path.display())),
    }
}

/// Load a `persisted` setting (`true`, `false` or a record); no file means
/// "persist every top-level key"
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PersistedSetting> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            Ok(PersistedSetting::from_json(&content)?)
        }
        None => Ok(PersistedSetting::Flag(true)),
    }
}

/// Restrict a state file to a set of dotted paths
pub fn reduce_file(path: &Path, paths: &[String]) -> anyhow::Result<StateTree> {
    let state = load_state(path)?;
    let paths = PropPath::parse_all(paths)?;
    Ok(reduce_state(&state, &paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistree_core::PersistError;
    use serde_json::json;
    use tempfile::TempDir;

    fn tree(value: Value) -> StateTree {
        value.as_object().cloned().unwrap()
    }

    fn split_config() -> PersistedSetting {
        PersistedSetting::from_json(
            r#"{"storageKey": "K", "paths": ["count", {"paths": ["userInfo.name"], "storage": "session"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_commit_then_restore() {
        let tmp = TempDir::new().unwrap();
        let dir = StorageDir::open(tmp.path()).unwrap();
        let defaults = tree(json!({"count": 0, "userInfo": {"name": "A", "email": "e"}}));

        let changed = tree(json!({"count": 2, "userInfo": {"name": "B", "email": "x"}}));
        dir.commit("app", changed, split_config()).unwrap();

        assert_eq!(dir.keys("local").unwrap(), vec!["K"]);
        assert_eq!(dir.keys("session").unwrap(), vec!["K"]);
        assert!(dir.storage_names().contains(&"session".to_string()));

        let restored = dir.restore("app", defaults, split_config()).unwrap();
        assert_eq!(
            Value::Object(restored),
            json!({"count": 2, "userInfo": {"name": "B", "email": "e"}})
        );
    }

    #[test]
    fn test_hydrate_clears_storage() {
        let tmp = TempDir::new().unwrap();
        let dir = StorageDir::open(tmp.path()).unwrap();
        dir.commit("app", tree(json!({"count": 5})), PersistedSetting::Flag(true))
            .unwrap();
        assert!(dir.show("local", "__PERSISTREE__app").unwrap().is_some());

        let state = dir
            .hydrate("app", tree(json!({"count": 0})), PersistedSetting::Flag(true), &[])
            .unwrap();
        assert_eq!(Value::Object(state), json!({"count": 0}));
        assert!(dir.show("local", "__PERSISTREE__app").unwrap().is_none());
    }

    #[test]
    fn test_remove_reports_existence() {
        let tmp = TempDir::new().unwrap();
        let dir = StorageDir::open(tmp.path()).unwrap();
        dir.storage("local").unwrap().set_item("k", "raw").unwrap();
        assert_eq!(dir.show("local", "k").unwrap().as_deref(), Some("raw"));
        assert!(dir.remove("local", "k").unwrap());
        assert!(!dir.remove("local", "k").unwrap());
    }

    #[test]
    fn test_reduce_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("state.json");
        std::fs::write(&file, r#"{"a": {"b": 1, "c": 2}, "d": 3}"#).unwrap();
        let reduced = reduce_file(&file, &["a.b".to_string(), "d".to_string()]).unwrap();
        assert_eq!(Value::Object(reduced), json!({"a": {"b": 1}, "d": 3}));

        std::fs::write(&file, "[1]").unwrap();
        assert!(load_state(&file).is_err());
    }

    #[test]
    fn test_missing_config_defaults() {
        assert_eq!(load_config(None).unwrap(), PersistedSetting::Flag(true));
    }

    #[test]
    fn test_disabled_setting_ignores_storage() {
        let tmp = TempDir::new().unwrap();
        let dir = StorageDir::open(tmp.path().join("db")).unwrap();
        dir.commit("app", tree(json!({"count": 5})), PersistedSetting::Flag(true))
            .unwrap();

        let file = tmp.path().join("persisted.json");
        std::fs::write(&file, "false").unwrap();
        let disabled = load_config(Some(&file)).unwrap();

        let state = dir
            .restore("app", tree(json!({"count": 0})), disabled.clone())
            .unwrap();
        assert_eq!(Value::Object(state), json!({"count": 0}));

        let err = dir
            .hydrate("app", tree(json!({"count": 0})), disabled, &[])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PersistError>(),
            Some(PersistError::NotPersisted(id)) if id == "app"
        ));
        assert!(dir.show("local", "__PERSISTREE__app").unwrap().is_some());
    }
}
