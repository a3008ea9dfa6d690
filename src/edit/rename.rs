//! Rename cascade.
//!
//! Renaming a node changes its id and, by prefix substitution, the id of
//! every node underneath it. The cascade is computed as a full old -> new
//! map first and applied in one pass, so callers never observe a half
//! renamed model.

use crate::model::{Node, id};

use std::collections::BTreeMap;

pub type RenameMap = BTreeMap<String, String>;

/// Old id -> new id for `node_id` and all its path descendants.
/// Empty when `new_name` equals the current name.
pub fn rename_map(nodes: &[Node], node_id: &str, new_name: &str) -> RenameMap {
    let mut map = RenameMap::new();
    if id::name_of(node_id) == new_name {
        return map;
    }

    let new_id = id::renamed_id(node_id, new_name);
    for node in nodes {
        if id::is_self_or_descendant(&node.id, node_id) {
            let renamed = format!("{}{}", new_id, &node.id[node_id.len()..]);
            map.insert(node.id.clone(), renamed);
        }
    }

    tracing::debug!(node_id, new_id = %new_id, affected = map.len(), "rename cascade");
    map
}

/// New snapshot with ids and relation entries rewritten through `map`.
/// Relation arrays that changed are re-sorted.
pub fn apply_rename(nodes: &[Node], map: &RenameMap) -> Vec<Node> {
    if map.is_empty() {
        return nodes.to_vec();
    }

    nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            if let Some(new_id) = map.get(&node.id) {
                node.id = new_id.clone();
            }
            rewrite_relation(&mut node.solved_by, map);
            rewrite_relation(&mut node.in_context_of, map);
            node
        })
        .collect()
}

fn rewrite_relation(ids: &mut Vec<String>, map: &RenameMap) {
    let mut changed = false;
    for entry in ids.iter_mut() {
        if let Some(new_id) = map.get(entry.as_str()) {
            *entry = new_id.clone();
            changed = true;
        }
    }
    if changed {
        ids.sort();
    }
}

/// `rename_map` followed by `apply_rename`.
pub fn rename_node(nodes: &[Node], node_id: &str, new_name: &str) -> Vec<Node> {
    let map = rename_map(nodes, node_id, new_name);
    apply_rename(nodes, &map)
}
