//! Host store: owns a state tree and notifies listeners on every commit
//!
//! A commit and its notification run under one reentrant commit lock, so
//! commits from other threads wait until every listener has seen the current
//! one, while listeners may still commit on the notifying thread.

use parking_lot::{ReentrantMutex, RwLock};
use persistree_core::{
    Listener, Mutation, MutationKind, PersistError, PersistResult, PropPath, StateHost, StateTree,
    SubscriptionId,
};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::SyncEngine;
use crate::tree::{deep_clone, get_path, merge_into, set_path};

/// A state container with synchronous change notification
pub struct Store {
    id: String,
    state: RwLock<StateTree>,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    commit_lock: ReentrantMutex<()>,
    engine: RwLock<Option<Arc<SyncEngine>>>,
}

impl Store {
    pub fn new(id: impl Into<String>, state: StateTree) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(state),
            listeners: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            commit_lock: ReentrantMutex::new(()),
            engine: RwLock::new(None),
        }
    }

    /// Build a store from a JSON object literal; non-objects start empty
    pub fn from_value(id: impl Into<String>, state: Value) -> Self {
        match state {
            Value::Object(map) => Self::new(id, map),
            _ => Self::new(id, StateTree::new()),
        }
    }

    /// Shared store handle
    pub fn shared(id: impl Into<String>, state: StateTree) -> SharedStore {
        Arc::new(Self::new(id, state))
    }

    /// Edit the state in place, then notify listeners
    pub fn mutate<F>(&self, f: F) -> PersistResult<()>
    where
        F: FnOnce(&mut StateTree),
    {
        self.commit(MutationKind::Direct, f)
    }

    /// Replace the value at `path`, then notify listeners
    pub fn set(&self, path: &PropPath, value: Value) -> PersistResult<()> {
        self.mutate(|state| set_path(state, path, value))
    }

    /// Value at `path` in the current state
    pub fn get(&self, path: &PropPath) -> Option<Value> {
        get_path(&self.state.read(), path).map(deep_clone)
    }

    /// Roll some or all paths back to their attach-time values
    pub fn hydrate(&self, paths: Option<&[PropPath]>) -> PersistResult<()> {
        let engine = self
            .engine
            .read()
            .clone()
            .ok_or_else(|| PersistError::NotPersisted(self.id.clone()))?;
        let _commit = self.commit_lock.lock();
        engine.hydrate(self, paths)
    }

    /// Attached engine, if the store is persisted
    pub fn engine(&self) -> Option<Arc<SyncEngine>> {
        self.engine.read().clone()
    }

    pub fn is_persisted(&self) -> bool {
        self.engine.read().is_some()
    }

    pub(crate) fn install_engine(&self, engine: Arc<SyncEngine>) {
        *self.engine.write() = Some(engine);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn commit<F>(&self, kind: MutationKind, f: F) -> PersistResult<()>
    where
        F: FnOnce(&mut StateTree),
    {
        let _commit = self.commit_lock.lock();
        f(&mut *self.state.write());
        self.notify(kind)
    }

    fn notify(&self, kind: MutationKind) -> PersistResult<()> {
        // Listeners may touch the store, so only the commit lock is held here.
        let listeners: Vec<Listener> = self.listeners.read().iter().map(|(_, l)| l.clone()).collect();
        let mutation = Mutation::new(self.id.clone(), kind);
        for listener in listeners {
            // a listener earlier in the round may have committed again
            let state = self.state();
            listener(&mutation, &state)?;
        }
        Ok(())
    }
}

impl StateHost for Store {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> StateTree {
        self.state.read().clone()
    }

    fn patch_as(&self, partial: &StateTree, kind: MutationKind) -> PersistResult<()> {
        self.commit(kind, |state| merge_into(state, partial))
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("state", &*self.state.read())
            .field("listeners", &self.listener_count())
            .field("persisted", &self.is_persisted())
            .finish()
    }
}

/// Thread-safe store handle
pub type SharedStore = Arc<Store>;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use persistree_core::listener;
    use serde_json::json;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn path(s: &str) -> PropPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_mutations_notify_in_order() {
        let store = Store::from_value("TEST", json!({"count": 0}));
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            store.subscribe(listener(move |m, s| {
                seen.lock().push((tag, m.kind, s["count"].clone()));
                Ok(())
            }));
        }

        store.set(&path("count"), json!(1)).unwrap();
        store.patch(json!({"count": 2}).as_object().unwrap()).unwrap();

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                ("first", MutationKind::Direct, json!(1)),
                ("second", MutationKind::Direct, json!(1)),
                ("first", MutationKind::PatchObject, json!(2)),
                ("second", MutationKind::PatchObject, json!(2)),
            ]
        );
    }

    #[test]
    fn test_patch_deep_merges() {
        let store = Store::from_value("TEST", json!({"u": {"name": "A", "email": "e"}, "n": 1}));
        store.patch(json!({"u": {"name": "B"}}).as_object().unwrap()).unwrap();
        assert_eq!(
            Value::Object(store.state()),
            json!({"u": {"name": "B", "email": "e"}, "n": 1})
        );
    }

    #[test]
    fn test_listener_error_reaches_caller() {
        let store = Store::from_value("TEST", json!({}));
        store.subscribe(listener(|_, _| {
            Err(PersistError::StorageError("disk full".into()))
        }));
        let err = store.set(&path("a"), json!(1)).unwrap_err();
        assert!(matches!(err, PersistError::StorageError(_)));
        // the mutation itself is committed
        assert_eq!(store.get(&path("a")), Some(json!(1)));
    }

    #[test]
    fn test_unsubscribe() {
        let store = Store::from_value("TEST", json!({}));
        let id = store.subscribe(listener(|_, _| Ok(())));
        assert_eq!(store.listener_count(), 1);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_listener_sees_commits_of_earlier_listeners() {
        let store = Arc::new(Store::from_value("TEST", json!({"count": 0, "doubled": 0})));
        let handle = Arc::downgrade(&store);
        store.subscribe(listener(move |_, s| {
            let doubled = json!(s["count"].as_i64().unwrap_or(0) * 2);
            match handle.upgrade() {
                Some(store) if s["doubled"] != doubled => store.set(&path("doubled"), doubled),
                _ => Ok(()),
            }
        }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        store.subscribe(listener(move |_, s| {
            recorder.lock().push(s["doubled"].clone());
            Ok(())
        }));

        store.set(&path("count"), json!(3)).unwrap();
        assert_eq!(*seen.lock(), vec![json!(6), json!(6)]);
        assert_eq!(store.get(&path("doubled")), Some(json!(6)));
    }

    #[test]
    fn test_concurrent_commits_notify_in_commit_order() {
        let store = Arc::new(Store::from_value("TEST", json!({"count": 0})));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(Some(entered_tx));

        let recorder = seen.clone();
        store.subscribe(listener(move |_, s| {
            if let Some(tx) = entered_tx.lock().take() {
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
            }
            recorder.lock().push(s["count"].clone());
            Ok(())
        }));

        let first = {
            let store = store.clone();
            thread::spawn(move || store.set(&path("count"), json!(1)).unwrap())
        };
        entered_rx.recv().unwrap();
        store.set(&path("count"), json!(2)).unwrap();
        first.join().unwrap();

        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_hydrate_without_engine() {
        let store = Store::from_value("TEST", json!({}));
        assert!(matches!(store.hydrate(None), Err(PersistError::NotPersisted(id)) if id == "TEST"));
    }
}
