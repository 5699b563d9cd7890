//! Structural helpers over state trees
//!
//! Mappings are merged key by key; arrays and scalars are atomic and are
//! replaced wholesale.

use persistree_core::{PropPath, StateTree};
use serde_json::Value;

/// Independent structural copy of a value
pub fn deep_clone(value: &Value) -> Value {
    value.clone()
}

/// Independent structural copy of a tree
pub fn deep_clone_tree(tree: &StateTree) -> StateTree {
    tree.clone()
}

/// True iff the value is a nested mapping
pub fn is_plain_object(value: &Value) -> bool {
    value.is_object()
}

/// True for an absent value, `null`, or a mapping/array with no entries
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Merge `incoming` onto `base`, returning a new value.
///
/// Both mappings: recurse key by key, keeping keys only in `base`.
/// Anything else: `incoming` wins.
pub fn deep_merge(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => {
            Value::Object(deep_merge_tree(base, incoming))
        }
        _ => incoming.clone(),
    }
}

/// Mapping-level [`deep_merge`]
pub fn deep_merge_tree(base: &StateTree, incoming: &StateTree) -> StateTree {
    let mut merged = base.clone();
    merge_into(&mut merged, incoming);
    merged
}

/// In-place merge of `incoming` into `target`
pub fn merge_into(target: &mut StateTree, incoming: &StateTree) {
    for (key, value) in incoming {
        merge_value_into(target, key, value);
    }
}

fn merge_value_into(target: &mut StateTree, key: &str, value: &Value) {
    match (target.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            merge_into(existing, incoming);
        }
        _ => {
            target.insert(key.to_string(), value.clone());
        }
    }
}

/// Value at `path`, if every segment resolves through mappings
pub fn get_path<'a>(tree: &'a StateTree, path: &PropPath) -> Option<&'a Value> {
    let (last, parents) = path.split_last()?;
    let mut current = tree;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

/// Merge `value` into `tree` at `path`, creating intermediate mappings.
///
/// Non-mapping intermediates are replaced by mappings. At the final segment
/// a mapping merges into an existing mapping; any other value replaces.
pub fn merge_at_path(tree: &mut StateTree, path: &PropPath, value: &Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let parent = parents.iter().fold(tree, |node, segment| child_map(node, segment));
    merge_value_into(parent, last, value);
}

/// Replace the value at `path`, creating intermediate mappings
pub fn set_path(tree: &mut StateTree, path: &PropPath, value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let parent = parents.iter().fold(tree, |node, segment| child_map(node, segment));
    parent.insert(last.clone(), value);
}

fn child_map<'a>(node: &'a mut StateTree, segment: &str) -> &'a mut StateTree {
    let slot = node
        .entry(segment.to_string())
        .or_insert_with(|| Value::Object(StateTree::new()));
    if !is_plain_object(slot) {
        *slot = Value::Object(StateTree::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just made a mapping"),
    }
}
