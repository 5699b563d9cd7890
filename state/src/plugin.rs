//! Persistence plugin: attaches a sync engine to stores

use persistree_core::{listener, Persisted, PersistResult, PluginOptions, StateHost};
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::SyncEngine;
use crate::group::{EffectiveBackend, GroupResolver};
use crate::memory::MemoryStorage;
use crate::store::Store;
use crate::tree::deep_clone_tree;

/// Plugin factory holding the defaults shared by every store it attaches to
pub struct PersistPlugin {
    defaults: EffectiveBackend,
}

impl PersistPlugin {
    /// Unset options fall back to a fresh in-memory storage, the default
    /// key scheme and the JSON codec.
    pub fn new(options: PluginOptions) -> Self {
        let base = EffectiveBackend::with_storage(MemoryStorage::shared());
        Self {
            defaults: base.overlay(&options),
        }
    }

    pub fn defaults(&self) -> &EffectiveBackend {
        &self.defaults
    }

    /// Attach persistence to `store`.
    ///
    /// Returns `None` when `persisted` is disabled. Otherwise captures the
    /// initial snapshot, resolves groups, restores stored state, and then
    /// subscribes the persist routine so the restore itself is not written
    /// back. Backend errors during restore are returned as-is.
    pub fn attach(&self, store: &Arc<Store>, persisted: impl Into<Persisted>) -> PersistResult<Option<Arc<SyncEngine>>> {
        let options = match persisted.into() {
            Persisted::Disabled => {
                debug!(store = store.id(), "Persistence disabled");
                return Ok(None);
            }
            Persisted::Enabled(options) => options,
        };

        let initial = deep_clone_tree(&store.state());
        let groups = GroupResolver::new(store.id(), &self.defaults).resolve(&options, &initial)?;
        let engine = Arc::new(SyncEngine::new(store.id(), initial, groups));

        engine.restore(store.as_ref())?;
        store.install_engine(engine.clone());

        let subscribed = engine.clone();
        store.subscribe(listener(move |mutation, state| {
            subscribed.on_mutation(mutation.kind, state)
        }));

        info!(
            store = store.id(),
            groups = engine.groups().len(),
            "Attached persistence"
        );
        Ok(Some(engine))
    }
}

impl Default for PersistPlugin {
    fn default() -> Self {
        Self::new(PluginOptions::default())
    }
}
