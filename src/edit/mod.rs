//! Change-sets and the atomic apply step.
//!
//! Editing operations are expressed as ordered lists of primitive
//! [`Change`]s (the `{cmd, ...}` JSON protocol). The rename and delete
//! engines produce them; [`apply_changes`] consumes them against an
//! immutable snapshot and either returns a complete new model or an error
//! with the input untouched.

pub mod delete;
pub mod rename;
pub mod session;

pub use delete::delete_implications;
pub use rename::{RenameMap, apply_rename, rename_map, rename_node};
pub use session::Session;

use crate::cycle;
use crate::diagnostics;
use crate::model::{Model, ModelErrors, Node, NodeType, RelationType, id};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// New value of an attribute: free text or a list (labels, artifacts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// One primitive edit. Wire form: `{"cmd": "onDeleteNode", "nodeId": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Change {
    #[serde(rename = "onDeleteNode", rename_all = "camelCase")]
    DeleteNode { node_id: String, node_type: NodeType },

    #[serde(rename = "onRemoveChildRef", rename_all = "camelCase")]
    RemoveChildRef {
        node_id: String,
        relation_type: RelationType,
        child_id: String,
    },

    #[serde(rename = "onAttributeChange", rename_all = "camelCase")]
    AttributeChange {
        node_id: String,
        attr: String,
        new_value: AttrValue,
    },

    #[serde(rename = "onNewChildNode", rename_all = "camelCase")]
    NewChildNode {
        node_id: String,
        relation_type: RelationType,
        child_type: NodeType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        child_name: Option<String>,
    },

    #[serde(rename = "onNewChildRef", rename_all = "camelCase")]
    NewChildRef {
        node_id: String,
        relation_type: RelationType,
        child_id: String,
    },
}

impl Change {
    pub fn node_id(&self) -> &str {
        match self {
            Change::DeleteNode { node_id, .. }
            | Change::RemoveChildRef { node_id, .. }
            | Change::AttributeChange { node_id, .. }
            | Change::NewChildNode { node_id, .. }
            | Change::NewChildRef { node_id, .. } => node_id,
        }
    }

    /// Short human-readable summary, used as an undo entry title.
    pub fn describe(&self) -> String {
        match self {
            Change::DeleteNode { node_id, .. } => format!("Deleted {}.", node_id),
            Change::RemoveChildRef {
                node_id,
                relation_type,
                child_id,
            } => format!("Removed {} as a {} from {}.", child_id, relation_type, node_id),
            Change::AttributeChange {
                node_id,
                attr,
                new_value,
            } => {
                if attr == "name" {
                    format!(
                        "Changed id of {} to {}.",
                        node_id,
                        id::renamed_id(node_id, &new_value.to_string())
                    )
                } else {
                    format!(
                        "Updated {} of {} to \"{}\".",
                        attr,
                        node_id,
                        diagnostics::truncate(&new_value.to_string(), 15)
                    )
                }
            }
            Change::NewChildNode {
                node_id,
                relation_type,
                child_type,
                ..
            } => format!("Created and added a {} as a {} to {}.", child_type, relation_type, node_id),
            Change::NewChildRef {
                node_id,
                relation_type,
                child_id,
            } => format!("Added {} as a {} to {}.", child_id, relation_type, node_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("node {0} does not exist")]
    NodeNotFound(String),

    #[error("referenced node {0} does not exist")]
    ChildNotFound(String),

    #[error("node id {0} is already taken")]
    DuplicateId(String),

    #[error("invalid name \"{name}\": {hint}")]
    InvalidName { name: String, hint: String },

    #[error("{node_id} has no {relation_type} entry {child_id}")]
    RelationNotFound {
        node_id: String,
        relation_type: RelationType,
        child_id: String,
    },

    #[error("cannot set attribute \"{attr}\": {reason}")]
    InvalidAttribute { attr: String, reason: String },

    #[error("{owner} cannot link to {target} via {relation_type}")]
    InvalidRelation {
        owner: String,
        target: String,
        relation_type: RelationType,
    },

    #[error("change-set would introduce {count} cycle(s)")]
    CycleIntroduced { count: usize },

    #[error("model changed since the batch was prepared (expected {expected}, found {actual})")]
    StaleBase { expected: String, actual: String },

    #[error(transparent)]
    Model(#[from] ModelErrors),
}

/// A change-set paired with the hash of the model it was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBatch {
    pub base_hash: String,
    pub changes: Vec<Change>,
}

impl EditBatch {
    pub fn new(model: &Model, changes: Vec<Change>) -> Self {
        Self {
            base_hash: model_hash(model),
            changes,
        }
    }
}

/// Hex SHA-256 of the compact canonical JSON of the node list.
pub fn model_hash(model: &Model) -> String {
    let canonical = serde_json::to_vec(model.nodes()).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

/// Apply a batch after checking it was prepared against this exact model.
pub fn apply_batch(model: &Model, batch: &EditBatch) -> Result<Model, ApplyError> {
    let actual = model_hash(model);
    if actual != batch.base_hash {
        return Err(ApplyError::StaleBase {
            expected: batch.base_hash.clone(),
            actual,
        });
    }
    apply_changes(model, &batch.changes)
}

/// Apply `changes` in order on a copy of `model`. All or nothing: the first
/// failing change, or a cycle in the result, rejects the whole batch.
pub fn apply_changes(model: &Model, changes: &[Change]) -> Result<Model, ApplyError> {
    let mut nodes = model.nodes().to_vec();

    for change in changes {
        apply_one(&mut nodes, change)?;
    }

    let count = cycle::count_cycles(&nodes);
    if count > 0 {
        return Err(ApplyError::CycleIntroduced { count });
    }

    tracing::debug!(changes = changes.len(), nodes = nodes.len(), "applied change-set");
    Ok(Model::new(nodes)?)
}

fn position(nodes: &[Node], node_id: &str) -> Result<usize, ApplyError> {
    nodes
        .iter()
        .position(|n| n.id == node_id)
        .ok_or_else(|| ApplyError::NodeNotFound(node_id.to_string()))
}

fn apply_one(nodes: &mut Vec<Node>, change: &Change) -> Result<(), ApplyError> {
    match change {
        Change::DeleteNode { node_id, .. } => {
            let idx = position(nodes, node_id)?;
            nodes.remove(idx);
            // Containers (and any referrer left over) drop the id as well.
            for node in nodes.iter_mut() {
                for rel in RelationType::ALL {
                    node.remove_relation(rel, node_id);
                }
            }
        }

        Change::RemoveChildRef {
            node_id,
            relation_type,
            child_id,
        } => {
            let idx = position(nodes, node_id)?;
            if !nodes[idx].remove_relation(*relation_type, child_id) {
                return Err(ApplyError::RelationNotFound {
                    node_id: node_id.clone(),
                    relation_type: *relation_type,
                    child_id: child_id.clone(),
                });
            }
        }

        Change::AttributeChange {
            node_id,
            attr,
            new_value,
        } => set_attribute(nodes, node_id, attr, new_value)?,

        Change::NewChildNode {
            node_id,
            relation_type,
            child_type,
            child_name,
        } => {
            let idx = position(nodes, node_id)?;
            check_relation(&nodes[idx], *relation_type, *child_type)?;

            let name = match child_name {
                Some(name) => {
                    check_name(name)?;
                    name.clone()
                }
                None => {
                    let taken: Vec<&str> = nodes.iter().map(Node::name).collect();
                    id::unique_child_name(child_type.short_name(), &taken)
                }
            };

            let child_id = id::child_id(node_id, &name);
            if nodes.iter().any(|n| n.id == child_id) {
                return Err(ApplyError::DuplicateId(child_id));
            }

            let mut child = Node::new(child_id.clone(), *child_type);
            child.uuid = Some(uuid::Uuid::new_v4().to_string());
            nodes[idx].add_relation(*relation_type, &child_id);
            nodes.push(child);
        }

        Change::NewChildRef {
            node_id,
            relation_type,
            child_id,
        } => {
            let idx = position(nodes, node_id)?;
            let target = nodes
                .iter()
                .find(|n| &n.id == child_id)
                .ok_or_else(|| ApplyError::ChildNotFound(child_id.clone()))?;
            if node_id == child_id {
                return Err(ApplyError::InvalidRelation {
                    owner: node_id.clone(),
                    target: child_id.clone(),
                    relation_type: *relation_type,
                });
            }
            check_relation(&nodes[idx], *relation_type, target.kind)?;
            nodes[idx].add_relation(*relation_type, child_id);
        }
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), ApplyError> {
    if id::is_valid_name(name) {
        Ok(())
    } else {
        Err(ApplyError::InvalidName {
            name: name.to_string(),
            hint: id::NAME_HINT.to_string(),
        })
    }
}

fn check_relation(owner: &Node, relation: RelationType, target: NodeType) -> Result<(), ApplyError> {
    if owner.kind.relation_to(target) == Some(relation) {
        Ok(())
    } else {
        Err(ApplyError::InvalidRelation {
            owner: owner.kind.to_string(),
            target: target.to_string(),
            relation_type: relation,
        })
    }
}

fn set_attribute(
    nodes: &mut Vec<Node>,
    node_id: &str,
    attr: &str,
    value: &AttrValue,
) -> Result<(), ApplyError> {
    let idx = position(nodes, node_id)?;

    let wrong_shape = |expected: &str| ApplyError::InvalidAttribute {
        attr: attr.to_string(),
        reason: format!("expected {}", expected),
    };

    match (attr, value) {
        ("name", AttrValue::Text(new_name)) => {
            check_name(new_name)?;
            let new_id = id::renamed_id(node_id, new_name);
            if new_id != node_id && nodes.iter().any(|n| n.id == new_id) {
                return Err(ApplyError::DuplicateId(new_id));
            }
            let map = rename::rename_map(nodes, node_id, new_name);
            *nodes = rename::apply_rename(nodes, &map);
        }
        ("summary", AttrValue::Text(text)) => {
            nodes[idx].summary = Some(text.clone()).filter(|t| !t.is_empty());
        }
        ("info", AttrValue::Text(text)) => {
            nodes[idx].info = Some(text.clone()).filter(|t| !t.is_empty());
        }
        ("labels", AttrValue::List(items)) => nodes[idx].labels = items.clone(),
        ("artifacts", AttrValue::List(items)) => nodes[idx].artifacts = items.clone(),
        ("name" | "summary" | "info", _) => return Err(wrong_shape("a string")),
        ("labels" | "artifacts", _) => return Err(wrong_shape("a list of strings")),
        _ => {
            return Err(ApplyError::InvalidAttribute {
                attr: attr.to_string(),
                reason: "not an editable attribute".to_string(),
            });
        }
    }
    Ok(())
}
