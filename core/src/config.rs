//! Configuration types for persistree
//!
//! Two layers: programmatic options carrying live backend handles, and a
//! serde-deserializable declarative form that names its storages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::PersistError;
use crate::traits::*;
use crate::types::StateTree;

/// Prefix of the storage key used when none is configured
pub const DEFAULT_STORAGE_KEY_PREFIX: &str = "__PERSISTREE__";

/// Storage name used by declarative configs that do not name one
pub const DEFAULT_STORAGE_NAME: &str = "local";

/// Default storage key for a store
pub fn default_storage_key(store_id: &str) -> String {
    format!("{}{}", DEFAULT_STORAGE_KEY_PREFIX, store_id)
}

/// Storage key, either fixed or derived from the store id
#[derive(Clone)]
pub enum StorageKey {
    Fixed(String),
    Derived(KeyFn),
}

impl StorageKey {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        StorageKey::Derived(Arc::new(f))
    }

    /// Resolve the key for a store
    pub fn resolve(&self, store_id: &str) -> String {
        match self {
            StorageKey::Fixed(key) => key.clone(),
            StorageKey::Derived(f) => f(store_id),
        }
    }
}

impl Default for StorageKey {
    fn default() -> Self {
        StorageKey::derived(default_storage_key)
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::Fixed(key) => write!(f, "Fixed({:?})", key),
            StorageKey::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

impl From<&str> for StorageKey {
    fn from(key: &str) -> Self {
        StorageKey::Fixed(key.to_string())
    }
}

impl From<String> for StorageKey {
    fn from(key: String) -> Self {
        StorageKey::Fixed(key)
    }
}

/// Backend settings, each optional; unset fields inherit from the enclosing level
#[derive(Clone, Default)]
pub struct BackendOverrides {
    pub storage: Option<Arc<dyn Storage>>,
    pub storage_key: Option<StorageKey>,
    pub get_state: Option<GetStateFn>,
    pub set_state: Option<SetStateFn>,
    pub remove_state: Option<RemoveStateFn>,
}

impl BackendOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn storage_key(mut self, key: impl Into<StorageKey>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    pub fn get_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Storage, &str) -> PersistResult<Option<StateTree>> + Send + Sync + 'static,
    {
        self.get_state = Some(Arc::new(f));
        self
    }

    pub fn set_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Storage, &str, &StateTree) -> PersistResult<()> + Send + Sync + 'static,
    {
        self.set_state = Some(Arc::new(f));
        self
    }

    pub fn remove_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Storage, &str) -> PersistResult<()> + Send + Sync + 'static,
    {
        self.remove_state = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for BackendOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendOverrides")
            .field("storage", &self.storage.is_some())
            .field("storage_key", &self.storage_key)
            .field("get_state", &self.get_state.is_some())
            .field("set_state", &self.set_state.is_some())
            .field("remove_state", &self.remove_state.is_some())
            .finish()
    }
}

/// Factory-level settings of a plugin
pub type PluginOptions = BackendOverrides;

/// An explicit path group: its own paths, optionally its own backend
#[derive(Clone, Debug)]
pub struct PathGroupOptions {
    pub paths: Vec<String>,
    pub backend: BackendOverrides,
}

impl PathGroupOptions {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            backend: BackendOverrides::default(),
        }
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.backend = self.backend.storage(storage);
        self
    }

    pub fn storage_key(mut self, key: impl Into<StorageKey>) -> Self {
        self.backend = self.backend.storage_key(key);
        self
    }

    pub fn backend(mut self, backend: BackendOverrides) -> Self {
        self.backend = backend;
        self
    }
}

/// One entry of a store's `paths` list
#[derive(Clone, Debug)]
pub enum PathEntry {
    /// Bare path, collected into the implicit default group
    Path(String),
    /// Explicit group
    Group(PathGroupOptions),
}

impl From<&str> for PathEntry {
    fn from(path: &str) -> Self {
        PathEntry::Path(path.to_string())
    }
}

impl From<String> for PathEntry {
    fn from(path: String) -> Self {
        PathEntry::Path(path)
    }
}

impl From<PathGroupOptions> for PathEntry {
    fn from(group: PathGroupOptions) -> Self {
        PathEntry::Group(group)
    }
}

/// Store-level persistence options
#[derive(Clone, Debug, Default)]
pub struct PersistOptions {
    /// `None` persists every top-level key present at attach time
    pub paths: Option<Vec<PathEntry>>,
    pub backend: BackendOverrides,
}

impl PersistOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bare path or a group to the paths list
    pub fn path(mut self, entry: impl Into<PathEntry>) -> Self {
        self.paths.get_or_insert_with(Vec::new).push(entry.into());
        self
    }

    pub fn paths<I, E>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<PathEntry>,
    {
        self.paths
            .get_or_insert_with(Vec::new)
            .extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.backend = self.backend.storage(storage);
        self
    }

    pub fn storage_key(mut self, key: impl Into<StorageKey>) -> Self {
        self.backend = self.backend.storage_key(key);
        self
    }

    pub fn backend(mut self, backend: BackendOverrides) -> Self {
        self.backend = backend;
        self
    }
}

/// Whether, and how, a store is persisted
#[derive(Clone, Debug, Default)]
pub enum Persisted {
    #[default]
    Disabled,
    Enabled(PersistOptions),
}

impl Persisted {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Persisted::Enabled(_))
    }
}

impl From<bool> for Persisted {
    fn from(enabled: bool) -> Self {
        if enabled {
            Persisted::Enabled(PersistOptions::default())
        } else {
            Persisted::Disabled
        }
    }
}

impl From<PersistOptions> for Persisted {
    fn from(options: PersistOptions) -> Self {
        Persisted::Enabled(options)
    }
}

// ============ Declarative configuration ============

/// Declarative store persistence settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistConfig {
    /// Paths to persist; absent means every top-level key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<PathEntryConfig>>,

    /// Named storage backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,

    /// Fixed storage key
    #[serde(default, alias = "storageKey", skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

/// Declarative `paths` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathEntryConfig {
    Path(String),
    Group(PathGroupConfig),
}

/// Declarative explicit path group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathGroupConfig {
    pub paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,

    #[serde(default, alias = "storageKey", skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

/// Declarative `persisted` value: a flag or a settings record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedSetting {
    Flag(bool),
    Options(PersistConfig),
}

impl Default for PersistedSetting {
    fn default() -> Self {
        PersistedSetting::Flag(false)
    }
}

impl PersistConfig {
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        serde_json::from_str(json).map_err(|e| PersistError::ConfigError(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        serde_json::to_string_pretty(self).map_err(|e| PersistError::ConfigError(e.to_string()))
    }

    /// Convert into programmatic options, looking up named storages with `resolve`
    pub fn into_options<R>(self, mut resolve: R) -> PersistResult<PersistOptions>
    where
        R: FnMut(&str) -> PersistResult<Arc<dyn Storage>>,
    {
        let mut options = PersistOptions::new();

        if let Some(name) = &self.storage {
            options = options.storage(resolve(name)?);
        }
        if let Some(key) = self.storage_key {
            options = options.storage_key(key);
        }

        if let Some(entries) = self.paths {
            let mut resolved = Vec::with_capacity(entries.len());
            for entry in entries {
                resolved.push(match entry {
                    PathEntryConfig::Path(path) => PathEntry::Path(path),
                    PathEntryConfig::Group(group) => {
                        let mut group_options = PathGroupOptions::new(group.paths);
                        if let Some(name) = &group.storage {
                            group_options = group_options.storage(resolve(name)?);
                        }
                        if let Some(key) = group.storage_key {
                            group_options = group_options.storage_key(key);
                        }
                        PathEntry::Group(group_options)
                    }
                });
            }
            options.paths = Some(resolved);
        }

        Ok(options)
    }
}

impl PersistedSetting {
    /// Parse `true`, `false` or a settings record
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        serde_json::from_str(json).map_err(|e| PersistError::ConfigError(e.to_string()))
    }

    pub fn into_persisted<R>(self, resolve: R) -> PersistResult<Persisted>
    where
        R: FnMut(&str) -> PersistResult<Arc<dyn Storage>>,
    {
        match self {
            PersistedSetting::Flag(enabled) => Ok(Persisted::from(enabled)),
            PersistedSetting::Options(config) => Ok(Persisted::Enabled(config.into_options(resolve)?)),
        }
    }
}
