//! Sync engine: restore, persist and hydrate over resolved path groups
//!
//! Every operation walks the groups in resolved order (explicit groups,
//! then the implicit group). On restore, later groups win at conflicting
//! leaves. Nothing is atomic across groups, and the read-merge-write of a
//! single group races with external writers to the same key.

use persistree_core::{MutationKind, PersistResult, PropPath, StateHost, StateTree};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

use crate::group::PathGroup;
use crate::reducer::reduce_state;
use crate::tree::{deep_merge_tree, is_empty, merge_into};

/// Per-store persistence state, fixed at attach time
pub struct SyncEngine {
    store_id: String,
    initial: StateTree,
    groups: Vec<PathGroup>,
}

impl SyncEngine {
    /// `initial` is the rollback target for [`SyncEngine::hydrate`]
    pub fn new(store_id: impl Into<String>, initial: StateTree, groups: Vec<PathGroup>) -> Self {
        Self {
            store_id: store_id.into(),
            initial,
            groups,
        }
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn groups(&self) -> &[PathGroup] {
        &self.groups
    }

    /// Snapshot of the state taken before anything was restored
    pub fn initial_snapshot(&self) -> &StateTree {
        &self.initial
    }

    /// Merge every group's stored snapshot, in group order
    pub fn restore_snapshot(&self) -> PersistResult<StateTree> {
        let mut restored = StateTree::new();
        for group in &self.groups {
            merge_into(&mut restored, &group.read()?);
        }
        Ok(restored)
    }

    /// Apply the stored snapshots to `host`; returns what was applied
    pub fn restore(&self, host: &dyn StateHost) -> PersistResult<StateTree> {
        let restored = Value::Object(self.restore_snapshot()?);
        match &restored {
            Value::Object(partial) if !is_empty(Some(&restored)) => {
                host.patch(partial)?;
                info!(store = %self.store_id, fields = partial.len(), "Restored persisted state");
            }
            _ => debug!(store = %self.store_id, "Nothing to restore"),
        }
        match restored {
            Value::Object(restored) => Ok(restored),
            _ => Ok(StateTree::new()),
        }
    }

    /// Persist routine for the host's change notifications; skips the
    /// rollback patch a hydrate applies, which is already stored.
    pub fn on_mutation(&self, kind: MutationKind, state: &StateTree) -> PersistResult<()> {
        if kind == MutationKind::Hydrate {
            return Ok(());
        }
        self.persist(state)
    }

    /// Write each group's view of `state` over what the group has stored
    pub fn persist(&self, state: &StateTree) -> PersistResult<()> {
        for group in &self.groups {
            merge_group(group, state)?;
        }
        Ok(())
    }

    /// Roll back to the attach-time snapshot.
    ///
    /// `None` removes every group's entry and restores the whole snapshot,
    /// keeping state keys the snapshot never had. `Some(paths)` restores only
    /// those paths, in memory and in each group's storage.
    pub fn hydrate(&self, host: &dyn StateHost, paths: Option<&[PropPath]>) -> PersistResult<()> {
        match paths {
            None => self.hydrate_all(host),
            Some(paths) => self.hydrate_paths(host, paths),
        }
    }

    fn hydrate_all(&self, host: &dyn StateHost) -> PersistResult<()> {
        for group in &self.groups {
            group.remove()?;
        }
        let rolled_back = deep_merge_tree(&host.state(), &self.initial);
        host.patch_as(&rolled_back, MutationKind::Hydrate)?;
        info!(store = %self.store_id, "Hydrated full state");
        Ok(())
    }

    fn hydrate_paths(&self, host: &dyn StateHost, paths: &[PropPath]) -> PersistResult<()> {
        let rollback = reduce_state(&self.initial, paths);
        let rolled_back = deep_merge_tree(&host.state(), &rollback);

        self.persist(&rolled_back)?;
        host.patch_as(&rolled_back, MutationKind::Hydrate)?;
        info!(store = %self.store_id, paths = paths.len(), "Hydrated selected paths");
        Ok(())
    }
}

fn merge_group(group: &PathGroup, state: &StateTree) -> PersistResult<()> {
    let stored = group.read()?;
    let view = reduce_state(state, group.paths());
    group.write(&deep_merge_tree(&stored, &view))
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("store_id", &self.store_id)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}
