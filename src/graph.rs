//! Relation graph derived from a node slice.
//!
//! The slice may be a filtered view of the model, so every traversal treats
//! ids missing from the slice as "filtered out" and stops there instead of
//! failing. Traversals keep a visited set; they terminate even on a cyclic
//! model (which the cycle validator rejects separately).

use crate::model::{Node, NodeType, RelationType, id};

use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A node that links to another one through a reference edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Referrer<'a> {
    pub id: &'a str,
    pub relation_type: RelationType,
}

/// Result of checking a prospective link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCheck {
    pub is_valid: bool,
    pub relation_type: Option<RelationType>,
    pub message: Option<String>,
}

impl TargetCheck {
    fn valid(relation_type: RelationType) -> Self {
        Self {
            is_valid: true,
            relation_type: Some(relation_type),
            message: None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            relation_type: None,
            message: Some(message.into()),
        }
    }
}

pub struct RelationGraph<'a> {
    nodes: &'a [Node],
    id_to_node: HashMap<&'a str, &'a Node>,
    /// child id -> owners listing it, per relation, in model order.
    incoming: HashMap<&'a str, Vec<(&'a str, RelationType)>>,
}

impl<'a> RelationGraph<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        let mut id_to_node = HashMap::with_capacity(nodes.len());
        let mut incoming: HashMap<&'a str, Vec<(&'a str, RelationType)>> = HashMap::new();
        for node in nodes {
            id_to_node.insert(node.id.as_str(), node);
            for (rel, child) in node.relations() {
                incoming
                    .entry(child)
                    .or_default()
                    .push((node.id.as_str(), rel));
            }
        }
        Self {
            nodes,
            id_to_node,
            incoming,
        }
    }

    pub fn nodes(&self) -> &'a [Node] {
        self.nodes
    }

    pub fn get(&self, node_id: &str) -> Option<&'a Node> {
        self.id_to_node.get(node_id).copied()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.id_to_node.contains_key(node_id)
    }

    /// Descendants via `solvedBy`, recursively. With `include_context`, the
    /// `inContextOf` targets of every visited node are added too (not
    /// descended into; context nodes own nothing). Insertion-ordered, each
    /// id once; the start node itself is not included.
    pub fn children(&self, node_id: &str, include_context: bool) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_children(node_id, include_context, &mut out, &mut seen);
        out
    }

    fn collect_children(
        &self,
        node_id: &str,
        include_context: bool,
        out: &mut Vec<&'a str>,
        seen: &mut HashSet<&'a str>,
    ) {
        let Some(node) = self.get(node_id) else {
            // Child might be filtered out.
            return;
        };

        if include_context {
            for ctx in &node.in_context_of {
                if seen.insert(ctx.as_str()) {
                    out.push(ctx.as_str());
                }
            }
        }

        for child in &node.solved_by {
            if seen.insert(child.as_str()) {
                out.push(child.as_str());
                self.collect_children(child, include_context, out, seen);
            }
        }
    }

    /// Nodes owned (transitively, through containment edges of either
    /// relation) by `node_id`, deepest first: every id appears before its
    /// container.
    pub fn contained_descendants(&self, node_id: &str) -> Vec<&'a str> {
        let mut pre_order = Vec::new();
        let mut seen = HashSet::new();
        self.collect_contained(node_id, &mut pre_order, &mut seen);
        pre_order.reverse();
        pre_order
    }

    fn collect_contained(
        &self,
        node_id: &str,
        out: &mut Vec<&'a str>,
        seen: &mut HashSet<&'a str>,
    ) {
        let Some(node) = self.get(node_id) else {
            return;
        };

        let owned: Vec<&'a str> = node
            .in_context_of
            .iter()
            .chain(node.solved_by.iter())
            .map(String::as_str)
            .filter(|child| id::is_containment(&node.id, child))
            .filter(|child| seen.insert(*child))
            .collect();

        out.extend(owned.iter().copied());
        for child in owned {
            self.collect_contained(child, out, seen);
        }
    }

    /// Ancestors, recursively through `solvedBy`. Context nodes are reached
    /// only through `inContextOf`, so their ancestors are their referrers
    /// plus the referrers' ancestors.
    pub fn parents(&self, node_id: &str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        let is_context = self
            .get(node_id)
            .map(|n| n.kind.is_context())
            .unwrap_or(false);

        if is_context {
            for owner in self.owners(node_id, RelationType::InContextOf) {
                if seen.insert(owner) {
                    out.push(owner);
                }
                self.collect_parents(owner, &mut out, &mut seen);
            }
        } else {
            self.collect_parents(node_id, &mut out, &mut seen);
        }

        out
    }

    fn collect_parents(&self, node_id: &str, out: &mut Vec<&'a str>, seen: &mut HashSet<&'a str>) {
        for owner in self.owners(node_id, RelationType::SolvedBy) {
            if seen.insert(owner) {
                out.push(owner);
                self.collect_parents(owner, out, seen);
            }
        }
    }

    /// Nodes listing `node_id` under `relation`, in model order.
    fn owners(&self, node_id: &str, relation: RelationType) -> Vec<&'a str> {
        self.incoming
            .get(node_id)
            .map(|list| {
                list.iter()
                    .filter(|(_, rel)| *rel == relation)
                    .map(|(owner, _)| *owner)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Owners of reference edges (not the container) pointing at `node_id`.
    /// `inContextOf` edges are listed before `solvedBy` ones for each owner.
    pub fn referrers(&self, node_id: &str) -> Vec<Referrer<'a>> {
        let mut out = Vec::new();
        for node in self.nodes {
            if !id::is_reference(&node.id, node_id) {
                continue;
            }
            for rel in [RelationType::InContextOf, RelationType::SolvedBy] {
                if node.relation(rel).iter().any(|c| c == node_id) {
                    out.push(Referrer {
                        id: node.id.as_str(),
                        relation_type: rel,
                    });
                }
            }
        }
        out
    }

    /// Candidates for a new link from `node_id`: of an allowed type, not the
    /// node itself, not already related, not an ancestor. Sorted by id.
    pub fn valid_targets(
        &self,
        node_id: &str,
        target_types: &[NodeType],
        current_relations: &[String],
    ) -> Vec<&'a Node> {
        let parents: HashSet<&str> = self.parents(node_id).into_iter().collect();

        let mut out: Vec<&'a Node> = self
            .nodes
            .iter()
            .filter(|n| target_types.contains(&n.kind))
            .filter(|n| {
                let nid = n.id.as_str();
                !(parents.contains(nid)
                    || current_relations.iter().any(|c| c == nid)
                    || nid == node_id)
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Classify a prospective link `node_id -> target_id`.
    pub fn is_valid_target(&self, node_id: &str, target_id: &str) -> TargetCheck {
        if node_id == target_id {
            return TargetCheck::invalid("Node cannot be linked to itself.");
        }

        let Some(node) = self.get(node_id) else {
            return TargetCheck::invalid(format!("Node {} is not in the model.", node_id));
        };
        let Some(target) = self.get(target_id) else {
            return TargetCheck::invalid(format!("Target {} is not in the model.", target_id));
        };

        let Some(relation) = node.kind.relation_to(target.kind) else {
            return TargetCheck::invalid(format!("Node cannot link to {} nodes.", target.kind));
        };

        if node.relation(relation).iter().any(|c| c == target_id) {
            return TargetCheck::invalid("Target is already linked with node.");
        }

        if relation == RelationType::SolvedBy && self.parents(node_id).contains(&target_id) {
            return TargetCheck::invalid("Cannot link to parent nodes.");
        }

        TargetCheck::valid(relation)
    }
}
