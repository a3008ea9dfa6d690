//! Raw model records (model.json) and their validation.
//!
//! JSON shape:
//! [
//!   {
//!     "id": "nsp/G1",              // path; first segment is the namespace
//!     "type": "Goal",
//!     "uuid": "…",                 // optional, generated when serializing
//!     "summary": "…", "info": "…", // optional
//!     "labels": ["l1"], "artifacts": ["a.zip"],
//!     "solvedBy": ["nsp/G1/S1"], "inContextOf": ["nsp/G1/C1"]
//!   },
//!   ...
//! ]
//!
//! `id` and `type` are kept loosely typed so one bad record yields a
//! per-record error instead of failing the whole parse.

use crate::model::error::{ModelError, ModelErrors};
use crate::model::{Model, Node, NodeType, id};

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default)]
    pub id: Value,

    #[serde(default, rename = "type")]
    pub kind: Value,

    #[serde(default)]
    pub uuid: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub info: Option<String>,

    #[serde(default)]
    pub artifacts: Option<Vec<String>>,

    #[serde(default)]
    pub labels: Option<Vec<String>>,

    #[serde(default)]
    pub solved_by: Option<Vec<String>>,

    #[serde(default)]
    pub in_context_of: Option<Vec<String>>,
}

impl RawNode {
    fn details(&self) -> String {
        // Re-serialize through Value so the details show what was read.
        let value = serde_json::json!({
            "id": self.id,
            "type": self.kind,
            "uuid": self.uuid,
            "summary": self.summary,
            "info": self.info,
            "labels": self.labels,
            "artifacts": self.artifacts,
            "solvedBy": self.solved_by,
            "inContextOf": self.in_context_of,
        });
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }
}

/// Validate every record and build the indexed model.
///
/// Phase 1: per-record checks (string id, id shape, known type).
/// Phase 2: uniqueness of ids (in `Model::new`).
///
/// Relation targets are not checked here; dangling references are legal
/// in memory (filtered views) and only fatal when serializing.
pub fn validate_and_build(raw: &[RawNode]) -> Result<Model, ModelErrors> {
    let mut errors = Vec::new();
    let mut nodes = Vec::with_capacity(raw.len());

    for (index, rn) in raw.iter().enumerate() {
        let index = index as i64;

        let node_id = match rn.id.as_str() {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => {
                errors.push(
                    ModelError::new("Node missing string id field", id::ID_HINT, index)
                        .with_details(rn.details()),
                );
                continue;
            }
        };

        if id::validate_id(&node_id).is_err() {
            errors.push(
                ModelError::new(
                    "Node has invalid string id field",
                    format!("{} and each path piece {}", id::ID_HINT, id::NAME_HINT),
                    index,
                )
                .at_node(node_id.clone())
                .with_details(rn.details()),
            );
        }

        let kind = match rn.kind.as_str().map(str::parse::<NodeType>) {
            Some(Ok(kind)) => Some(kind),
            Some(Err(hint)) => {
                errors.push(
                    ModelError::new(
                        format!("Invalid type \"{}\"", rn.kind.as_str().unwrap_or_default()),
                        hint,
                        index,
                    )
                    .at_node(node_id.clone())
                    .with_details(rn.details()),
                );
                None
            }
            None => {
                errors.push(
                    ModelError::new(
                        format!("Invalid type \"{}\"", rn.kind),
                        NodeType::type_hint(),
                        index,
                    )
                    .at_node(node_id.clone())
                    .with_details(rn.details()),
                );
                None
            }
        };

        let Some(kind) = kind else {
            continue;
        };

        let mut node = Node::new(node_id, kind);
        node.uuid = rn.uuid.clone().filter(|u| !u.trim().is_empty());
        node.summary = rn.summary.clone();
        node.info = rn.info.clone();
        node.artifacts = rn.artifacts.clone().unwrap_or_default();
        node.labels = rn.labels.clone().unwrap_or_default();
        node.solved_by = normalize_relation(rn.solved_by.clone().unwrap_or_default());
        node.in_context_of = normalize_relation(rn.in_context_of.clone().unwrap_or_default());
        nodes.push(node);
    }

    if !errors.is_empty() {
        return Err(ModelErrors(errors));
    }

    Model::new(nodes)
}

fn normalize_relation(mut ids: Vec<String>) -> Vec<String> {
    // Relations are sorted sets.
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> Vec<RawNode> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn builds_model_and_sorts_relations() {
        let raw = parse(
            r#"[
                {"id":"nsp/G1","type":"Goal","solvedBy":["nsp/G1/G3","nsp/G1/G2","nsp/G1/G2"]},
                {"id":"nsp/G1/G2","type":"Goal"},
                {"id":"nsp/G1/G3","type":"Goal"}
            ]"#,
        );
        let model = validate_and_build(&raw).unwrap();
        assert_eq!(model.len(), 3);
        assert_eq!(
            model.get("nsp/G1").unwrap().solved_by,
            vec!["nsp/G1/G2", "nsp/G1/G3"]
        );
    }

    #[test]
    fn null_id_is_reported_with_index() {
        let raw = parse(r#"[{"id":"nsp/G1","type":"Goal"},{"id":null,"type":"Goal"}]"#);
        let errs = validate_and_build(&raw).unwrap_err();
        assert_eq!(errs.0.len(), 1);
        assert!(errs.0[0].message.contains("missing string id"));
        assert_eq!(errs.0[0].index, 1);
        assert_eq!(errs.0[0].node_id, None);
    }

    #[test]
    fn bad_id_and_bad_type_are_both_collected() {
        let raw = parse(r#"[{"id":"G1","type":"Goal"},{"id":"nsp/G2","type":"Claim"}]"#);
        let errs = validate_and_build(&raw).unwrap_err();
        assert_eq!(errs.0.len(), 2);
        assert_eq!(errs.0[0].message, "Node has invalid string id field");
        assert_eq!(errs.0[1].message, "Invalid type \"Claim\"");
        assert!(errs.0[1].hint.contains("Justification"));
        assert_eq!(errs.0[1].node_id.as_deref(), Some("nsp/G2"));
    }

    #[test]
    fn blank_uuid_is_treated_as_missing() {
        let raw = parse(r#"[{"id":"nsp/G1","type":"Goal","uuid":" "}]"#);
        let model = validate_and_build(&raw).unwrap();
        assert_eq!(model.get("nsp/G1").unwrap().uuid, None);
    }
}
