//! Node model: wire records, node/relation kinds and the indexed arena.
//!
//! We keep two representations (like any boundary-validated input):
//! - `RawNode` (see `raw`): the JSON as written, loosely typed
//! - `Node` / `Model`: validated records indexed by integer handle
//!
//! The arena stores each node's container handle, computed once at build
//! time from the id paths, so containment tests are handle comparisons.

pub mod error;
pub mod id;
pub mod raw;

pub use error::{ModelError, ModelErrors};
pub use raw::RawNode;

use crate::Result;
use crate::graph::RelationGraph;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Handle into `Model::nodes`.
pub type NodeIdx = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Goal,
    Strategy,
    Solution,
    Assumption,
    Context,
    Justification,
}

impl NodeType {
    pub const ALL: [NodeType; 6] = [
        NodeType::Goal,
        NodeType::Strategy,
        NodeType::Solution,
        NodeType::Assumption,
        NodeType::Context,
        NodeType::Justification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Goal => "Goal",
            NodeType::Strategy => "Strategy",
            NodeType::Solution => "Solution",
            NodeType::Assumption => "Assumption",
            NodeType::Context => "Context",
            NodeType::Justification => "Justification",
        }
    }

    /// Lower-case keyword used in the text form (`goal G1 { ... }`).
    pub fn keyword(self) -> &'static str {
        match self {
            NodeType::Goal => "goal",
            NodeType::Strategy => "strategy",
            NodeType::Solution => "solution",
            NodeType::Assumption => "assumption",
            NodeType::Context => "context",
            NodeType::Justification => "justification",
        }
    }

    /// Namespace block keyword, chosen by the type of the namespace root.
    pub fn namespace_keyword(self) -> &'static str {
        match self {
            NodeType::Goal => "GOALS",
            NodeType::Strategy => "STRATEGIES",
            NodeType::Solution => "SOLUTIONS",
            NodeType::Assumption => "ASSUMPTIONS",
            NodeType::Context => "CONTEXTS",
            NodeType::Justification => "JUSTIFICATIONS",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<NodeType> {
        NodeType::ALL.into_iter().find(|t| t.keyword() == keyword)
    }

    pub fn from_namespace_keyword(keyword: &str) -> Option<NodeType> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.namespace_keyword() == keyword)
    }

    /// Prefix for generated child names.
    pub fn short_name(self) -> &'static str {
        match self {
            NodeType::Solution => "Sn",
            NodeType::Goal => "G",
            NodeType::Strategy => "S",
            NodeType::Assumption => "A",
            NodeType::Context => "C",
            NodeType::Justification => "J",
        }
    }

    pub fn type_hint() -> String {
        let names: Vec<&str> = NodeType::ALL.iter().map(|t| t.as_str()).collect();
        format!("Type must be one of {}", names.join(", "))
    }

    /// Context nodes are only ever reached through `inContextOf`.
    pub fn is_context(self) -> bool {
        matches!(
            self,
            NodeType::Assumption | NodeType::Context | NodeType::Justification
        )
    }

    pub fn solved_by_targets(self) -> &'static [NodeType] {
        match self {
            NodeType::Goal => &[NodeType::Goal, NodeType::Strategy, NodeType::Solution],
            NodeType::Strategy => &[NodeType::Goal],
            _ => &[],
        }
    }

    pub fn in_context_of_targets(self) -> &'static [NodeType] {
        match self {
            NodeType::Goal | NodeType::Strategy => &[
                NodeType::Assumption,
                NodeType::Context,
                NodeType::Justification,
            ],
            _ => &[],
        }
    }

    /// Relation an owner of this type would use to link `target`, if allowed.
    pub fn relation_to(self, target: NodeType) -> Option<RelationType> {
        if target.is_context() {
            self.in_context_of_targets()
                .contains(&target)
                .then_some(RelationType::InContextOf)
        } else {
            self.solved_by_targets()
                .contains(&target)
                .then_some(RelationType::SolvedBy)
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(NodeType::type_hint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationType {
    #[serde(rename = "solvedBy")]
    SolvedBy,
    #[serde(rename = "inContextOf")]
    InContextOf,
}

impl RelationType {
    pub const ALL: [RelationType; 2] = [RelationType::SolvedBy, RelationType::InContextOf];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::SolvedBy => "solvedBy",
            RelationType::InContextOf => "inContextOf",
        }
    }

    /// Relation a container uses for a child of the given type.
    pub fn for_child(child: NodeType) -> RelationType {
        if child.is_context() {
            RelationType::InContextOf
        } else {
            RelationType::SolvedBy
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One GSN node as stored in the JSON model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(rename = "type")]
    pub kind: NodeType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// Sorted set of child ids (containment and reference alike).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub solved_by: Vec<String>,

    /// Sorted set of context ids (containment and reference alike).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_context_of: Vec<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeType) -> Self {
        Self {
            id: id.into(),
            uuid: None,
            kind,
            summary: None,
            info: None,
            artifacts: Vec::new(),
            labels: Vec::new(),
            solved_by: Vec::new(),
            in_context_of: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        id::name_of(&self.id)
    }

    pub fn relation(&self, relation: RelationType) -> &[String] {
        match relation {
            RelationType::SolvedBy => &self.solved_by,
            RelationType::InContextOf => &self.in_context_of,
        }
    }

    pub fn relation_mut(&mut self, relation: RelationType) -> &mut Vec<String> {
        match relation {
            RelationType::SolvedBy => &mut self.solved_by,
            RelationType::InContextOf => &mut self.in_context_of,
        }
    }

    /// All outgoing edges, `solvedBy` first.
    pub fn relations(&self) -> impl Iterator<Item = (RelationType, &str)> + '_ {
        RelationType::ALL
            .into_iter()
            .flat_map(move |rel| self.relation(rel).iter().map(move |c| (rel, c.as_str())))
    }

    pub fn links_to(&self, child_id: &str) -> bool {
        self.relations().any(|(_, c)| c == child_id)
    }

    /// Insert keeping the relation a sorted set.
    pub fn add_relation(&mut self, relation: RelationType, child_id: &str) -> bool {
        let list = self.relation_mut(relation);
        match list.binary_search_by(|c| c.as_str().cmp(child_id)) {
            Ok(_) => false,
            Err(pos) => {
                list.insert(pos, child_id.to_string());
                true
            }
        }
    }

    pub fn remove_relation(&mut self, relation: RelationType, child_id: &str) -> bool {
        let list = self.relation_mut(relation);
        let before = list.len();
        list.retain(|c| c != child_id);
        list.len() != before
    }
}

/// Validated model: nodes unique by id, indexed, with container handles.
#[derive(Debug, Clone, Default)]
pub struct Model {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIdx>,
    container: Vec<Option<NodeIdx>>,
}

impl Model {
    /// Build the arena. Fails on duplicate ids; everything else is left to
    /// the callers that care (serializer, apply step).
    pub fn new(nodes: Vec<Node>) -> std::result::Result<Self, ModelErrors> {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut errors = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                errors.push(ModelError::duplicate_id(i, node));
            }
        }
        if !errors.is_empty() {
            return Err(ModelErrors(errors));
        }

        let container = nodes
            .iter()
            .map(|n| index.get(id::parent_id(&n.id)).copied())
            .collect();

        Ok(Self {
            nodes,
            index,
            container,
        })
    }

    /// Parse and validate a JSON array of node records.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: Vec<RawNode> = serde_json::from_str(text)
            .context("model json is not an array of nodes")?;
        Ok(raw::validate_and_build(&raw)?)
    }

    pub fn from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read model file {}", path))?;
        Self::from_json(&text).with_context(|| format!("load model {}", path))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.nodes)?)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx]
    }

    pub fn container_of(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.container[idx]
    }

    /// Handle comparison form of `id::is_containment`.
    pub fn is_contained_by(&self, owner: NodeIdx, child: NodeIdx) -> bool {
        self.container[child] == Some(owner)
    }

    pub fn graph(&self) -> RelationGraph<'_> {
        RelationGraph::new(&self.nodes)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn type_rules_pick_relation_by_target() {
        assert_eq!(
            NodeType::Goal.relation_to(NodeType::Context),
            Some(RelationType::InContextOf)
        );
        assert_eq!(
            NodeType::Strategy.relation_to(NodeType::Goal),
            Some(RelationType::SolvedBy)
        );
        assert_eq!(NodeType::Strategy.relation_to(NodeType::Solution), None);
        assert_eq!(NodeType::Solution.relation_to(NodeType::Goal), None);
    }

    #[test]
    fn node_json_uses_wire_field_names() {
        let node: Node = serde_json::from_str(
            r#"{"id":"m/G1","type":"Goal","solvedBy":["m/G1/G2"],"inContextOf":["m/G1/C1"]}"#,
        )
        .unwrap();
        assert_eq!(node.kind, NodeType::Goal);
        assert_eq!(node.solved_by, vec!["m/G1/G2".to_string()]);
        assert_eq!(node.in_context_of, vec!["m/G1/C1".to_string()]);

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], "Goal");
        assert_eq!(back["solvedBy"][0], "m/G1/G2");
        assert!(back.get("summary").is_none());
    }

    #[test]
    fn add_relation_keeps_sorted_set() {
        let mut n = Node::new("m/G1", NodeType::Goal);
        assert!(n.add_relation(RelationType::SolvedBy, "m/G1/G3"));
        assert!(n.add_relation(RelationType::SolvedBy, "m/G1/G2"));
        assert!(!n.add_relation(RelationType::SolvedBy, "m/G1/G2"));
        assert_eq!(n.solved_by, vec!["m/G1/G2", "m/G1/G3"]);
        assert!(n.remove_relation(RelationType::SolvedBy, "m/G1/G2"));
        assert!(!n.remove_relation(RelationType::SolvedBy, "m/G1/G2"));
    }

    #[test]
    fn arena_tracks_containers() {
        let model = Model::new(vec![
            Node::new("m/G1", NodeType::Goal),
            Node::new("m/G1/G2", NodeType::Goal),
            Node::new("m/G3", NodeType::Goal),
        ])
        .unwrap();
        let g1 = model.index_of("m/G1").unwrap();
        let g2 = model.index_of("m/G1/G2").unwrap();
        let g3 = model.index_of("m/G3").unwrap();
        assert!(model.is_contained_by(g1, g2));
        assert!(!model.is_contained_by(g3, g2));
        assert_eq!(model.container_of(g1), None);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = Model::new(vec![
            Node::new("m/G1", NodeType::Goal),
            Node::new("m/G1", NodeType::Strategy),
        ])
        .unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert_eq!(err.0[0].index, 1);
    }
}
