//! Path reducer: restrict a state tree to a set of paths

use persistree_core::{PropPath, StateTree};

use crate::tree::{get_path, merge_at_path};

/// Build a fresh tree holding only the values reachable at `paths`.
///
/// A path whose segments do not resolve through mappings is skipped. Values
/// land at the same nested location they had in `source`; a path nested
/// under another path merges into the structure the ancestor produced, so
/// the order of `paths` does not change the result.
pub fn reduce_state(source: &StateTree, paths: &[PropPath]) -> StateTree {
    let mut reduced = StateTree::new();
    for path in paths {
        if let Some(value) = get_path(source, path) {
            merge_at_path(&mut reduced, path, value);
        }
    }
    reduced
}
