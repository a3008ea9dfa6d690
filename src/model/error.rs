//! Model validation errors.
//!
//! Structural, referential and consistency problems found while validating or
//! serializing a model are collected, never reported one at a time, so a
//! single run shows the user everything that needs fixing.

use crate::model::Node;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Index used for errors that concern the whole model (cycles).
pub const MODEL_WIDE: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelError {
    pub message: String,
    pub hint: String,
    /// Position of the offending record in the input array.
    pub index: i64,
    pub node_id: Option<String>,
    /// Pretty JSON of the offending record, shown in verbose mode.
    pub node_details: Option<String>,
}

impl ModelError {
    pub fn new(message: impl Into<String>, hint: impl Into<String>, index: i64) -> Self {
        Self {
            message: message.into(),
            hint: hint.into(),
            index,
            node_id: None,
            node_details: None,
        }
    }

    pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.node_details = Some(details.into());
        self
    }

    pub(crate) fn duplicate_id(index: usize, node: &Node) -> Self {
        Self::new(
            format!("Duplicate node id \"{}\"", node.id),
            crate::model::id::ID_HINT,
            index as i64,
        )
        .at_node(node.id.clone())
        .with_details(serde_json::to_string_pretty(node).unwrap_or_default())
    }

    /// Multi-line report in the CLI layout.
    pub fn report(&self, verbose: bool) -> String {
        let mut out = format!(
            "MODEL-ERROR: node index [{}] id = {}\n{}",
            self.index,
            self.node_id.as_deref().unwrap_or("null"),
            self.message
        );
        if verbose {
            if let Some(details) = &self.node_details {
                out.push('\n');
                out.push_str(details);
            }
        }
        out.push_str("\nHint: ");
        out.push_str(&self.hint);
        out
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "[{}] {}: {}", self.index, id, self.message),
            None => write!(f, "[{}] {}", self.index, self.message),
        }
    }
}

/// Non-empty list of model errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model contains {} error(s): {}", .0.len(), summarize(.0))]
pub struct ModelErrors(pub Vec<ModelError>);

impl ModelErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ModelError> {
        self.0.iter()
    }
}

fn summarize(errors: &[ModelError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn report_includes_details_only_when_verbose() {
        let err = ModelError::new("Invalid type \"Foo\"", "Type must be Goal", 3)
            .at_node("m/G1")
            .with_details("{...}");
        assert_eq!(
            err.report(false),
            "MODEL-ERROR: node index [3] id = m/G1\nInvalid type \"Foo\"\nHint: Type must be Goal"
        );
        assert!(err.report(true).contains("{...}"));
    }

    #[test]
    fn display_lists_every_error() {
        let errs = ModelErrors(vec![
            ModelError::new("a", "", 0),
            ModelError::new("b", "", MODEL_WIDE),
        ]);
        assert_eq!(errs.to_string(), "model contains 2 error(s): [0] a; [-1] b");
    }
}
