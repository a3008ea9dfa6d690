//! Deletion implications.
//!
//! Deleting a node deletes everything it contains. Before a node goes away,
//! every reference edge pointing at it from outside the doomed subtree has
//! to be removed, so the change-set is ordered leaves first:
//!
//! 1. contained descendants, deepest first: their external referrers'
//!    `RemoveChildRef`s, then their `DeleteNode`
//! 2. external referrers of the node itself
//! 3. `DeleteNode` for the node

use super::Change;
use crate::Result;
use crate::graph::RelationGraph;
use crate::model::Node;

use anyhow::bail;
use std::collections::HashSet;

pub fn delete_implications(nodes: &[Node], node_id: &str) -> Result<Vec<Change>> {
    let graph = RelationGraph::new(nodes);
    let Some(node) = graph.get(node_id) else {
        bail!("cannot delete {}: no such node", node_id);
    };

    let descendants = graph.contained_descendants(node_id);
    let doomed_set: HashSet<&str> = descendants.iter().copied().collect();
    let doomed = |referrer: &str| referrer == node_id || doomed_set.contains(referrer);

    let mut changes = Vec::new();

    for &child_id in &descendants {
        push_referrer_removals(&graph, child_id, &doomed, &mut changes);
        let Some(child) = graph.get(child_id) else {
            continue;
        };
        changes.push(Change::DeleteNode {
            node_id: child_id.to_string(),
            node_type: child.kind,
        });
    }

    push_referrer_removals(&graph, node_id, &doomed, &mut changes);
    changes.push(Change::DeleteNode {
        node_id: node_id.to_string(),
        node_type: node.kind,
    });

    tracing::debug!(node_id, changes = changes.len(), "delete implications");
    Ok(changes)
}

fn push_referrer_removals(
    graph: &RelationGraph<'_>,
    target: &str,
    doomed: &impl Fn(&str) -> bool,
    changes: &mut Vec<Change>,
) {
    for referrer in graph.referrers(target) {
        // Referrers inside the deleted subtree go away with it.
        if doomed(referrer.id) {
            continue;
        }
        changes.push(Change::RemoveChildRef {
            node_id: referrer.id.to_string(),
            relation_type: referrer.relation_type,
            child_id: target.to_string(),
        });
    }
}
