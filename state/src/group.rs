//! Path group resolution
//!
//! Turns the heterogeneous `paths` configuration of a store into an ordered,
//! immutable list of fully specified groups. Settings layer as
//! plugin defaults < store options < group options.

use persistree_core::{
    json_get_state, json_remove_state, json_set_state, BackendOverrides, GetStateFn, PathEntry,
    PersistError, PersistOptions, PersistResult, PropPath, RemoveStateFn, SetStateFn, StateTree,
    Storage, StorageKey,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Backend settings with every field filled in
#[derive(Clone)]
pub struct EffectiveBackend {
    pub storage: Arc<dyn Storage>,
    pub storage_key: StorageKey,
    pub get_state: GetStateFn,
    pub set_state: SetStateFn,
    pub remove_state: RemoveStateFn,
}

impl EffectiveBackend {
    /// JSON operations and the default key over `storage`
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            storage_key: StorageKey::default(),
            get_state: Arc::new(json_get_state),
            set_state: Arc::new(json_set_state),
            remove_state: Arc::new(json_remove_state),
        }
    }

    /// Settings from `overrides` where present, `self` otherwise
    pub fn overlay(&self, overrides: &BackendOverrides) -> Self {
        Self {
            storage: overrides.storage.clone().unwrap_or_else(|| self.storage.clone()),
            storage_key: overrides
                .storage_key
                .clone()
                .unwrap_or_else(|| self.storage_key.clone()),
            get_state: overrides.get_state.clone().unwrap_or_else(|| self.get_state.clone()),
            set_state: overrides.set_state.clone().unwrap_or_else(|| self.set_state.clone()),
            remove_state: overrides
                .remove_state
                .clone()
                .unwrap_or_else(|| self.remove_state.clone()),
        }
    }

    /// Pin the storage key for a store
    fn bind(&self, store_id: &str) -> Self {
        Self {
            storage_key: StorageKey::Fixed(self.storage_key.resolve(store_id)),
            ..self.clone()
        }
    }
}

impl fmt::Debug for EffectiveBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveBackend")
            .field("storage_key", &self.storage_key)
            .finish_non_exhaustive()
    }
}

/// A resolved set of paths bound to one storage entry
#[derive(Clone)]
pub struct PathGroup {
    paths: Vec<PropPath>,
    storage: Arc<dyn Storage>,
    storage_key: String,
    get_state: GetStateFn,
    set_state: SetStateFn,
    remove_state: RemoveStateFn,
    implicit: bool,
}

impl PathGroup {
    pub fn new(paths: Vec<PropPath>, backend: &EffectiveBackend, store_id: &str) -> Self {
        Self {
            paths,
            storage: backend.storage.clone(),
            storage_key: backend.storage_key.resolve(store_id),
            get_state: backend.get_state.clone(),
            set_state: backend.set_state.clone(),
            remove_state: backend.remove_state.clone(),
            implicit: false,
        }
    }

    pub fn paths(&self) -> &[PropPath] {
        &self.paths
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// True for the default group collecting bare paths
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// Stored snapshot; a missing entry reads as an empty tree
    pub fn read(&self) -> PersistResult<StateTree> {
        let stored = (self.get_state)(self.storage.as_ref(), &self.storage_key)?;
        debug!(key = %self.storage_key, found = stored.is_some(), "Read group snapshot");
        Ok(stored.unwrap_or_default())
    }

    pub fn write(&self, value: &StateTree) -> PersistResult<()> {
        debug!(key = %self.storage_key, fields = value.len(), "Write group snapshot");
        (self.set_state)(self.storage.as_ref(), &self.storage_key, value)
    }

    pub fn remove(&self) -> PersistResult<()> {
        debug!(key = %self.storage_key, "Remove group snapshot");
        (self.remove_state)(self.storage.as_ref(), &self.storage_key)
    }
}

impl fmt::Debug for PathGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathGroup")
            .field("paths", &self.paths)
            .field("storage_key", &self.storage_key)
            .field("implicit", &self.implicit)
            .finish_non_exhaustive()
    }
}

/// Builds the ordered group list for one store attachment
pub struct GroupResolver<'a> {
    store_id: &'a str,
    defaults: EffectiveBackend,
}

impl<'a> GroupResolver<'a> {
    pub fn new(store_id: &'a str, defaults: &EffectiveBackend) -> Self {
        Self {
            store_id,
            defaults: defaults.clone(),
        }
    }

    /// Resolve `options` against `initial`.
    ///
    /// Explicit groups come first, in configuration order; the implicit
    /// group is always last, so its reads layer over theirs on restore.
    /// Without configured paths every top-level key of `initial` goes to
    /// the implicit group.
    pub fn resolve(&self, options: &PersistOptions, initial: &StateTree) -> PersistResult<Vec<PathGroup>> {
        let store_level = self.defaults.overlay(&options.backend).bind(self.store_id);

        let entries: Vec<PathEntry> = match &options.paths {
            Some(entries) => entries.clone(),
            None => initial.keys().cloned().map(PathEntry::Path).collect(),
        };

        let mut groups = Vec::new();
        let mut bare_paths = Vec::new();

        for entry in entries {
            match entry {
                PathEntry::Path(path) => bare_paths.push(self.parse_path(&path)?),
                PathEntry::Group(group) => {
                    if group.paths.is_empty() {
                        return Err(PersistError::ConfigError(format!(
                            "path group #{} of store '{}' has no paths",
                            groups.len(),
                            self.store_id
                        )));
                    }
                    let paths = group
                        .paths
                        .iter()
                        .map(|p| self.parse_path(p))
                        .collect::<PersistResult<Vec<_>>>()?;
                    let backend = store_level.overlay(&group.backend);
                    groups.push(PathGroup::new(paths, &backend, self.store_id));
                }
            }
        }

        let mut implicit = PathGroup::new(bare_paths, &store_level, self.store_id);
        implicit.implicit = true;
        groups.push(implicit);

        debug!(store = self.store_id, groups = groups.len(), "Resolved path groups");
        Ok(groups)
    }

    fn parse_path(&self, path: &str) -> PersistResult<PropPath> {
        PropPath::parse(path).map_err(|e| match e {
            PersistError::InvalidPath { path, reason } => PersistError::InvalidPath {
                path,
                reason: format!("{} (store '{}')", reason, self.store_id),
            },
            other => other,
        })
    }
}
