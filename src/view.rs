//! Views: label expressions that filter the model.
//!
//! Expression language:
//!   Expr := Or ( '||' Or )*
//!   Or   := And ( '&&' And )*
//!   And  := ['!'] (Label | GroupName)
//!
//! Group names are replaced at parse time by their resolved membership, so a
//! group term is true iff at least one member label is present (negated: iff
//! none is). The empty expression matches every node.

use crate::graph::RelationGraph;
use crate::labels::{self, Label, Validation};
use crate::model::Node;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

const OR: &str = "||";
const AND: &str = "&&";
const NOT: char = '!';

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub expression: String,

    #[serde(default)]
    pub include_parents: bool,

    #[serde(default)]
    pub include_subtrees: bool,

    #[serde(default)]
    pub expand_all: bool,

    #[serde(default)]
    pub highlight_matches: bool,
}

impl View {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("Sub-expressions cannot be empty!")]
    EmptySubExpression,

    #[error("Negate-operator (!) can only be used before a label.")]
    MisplacedNegation,

    #[error("Lacking label/group definition for \"{0}\"")]
    UndefinedLabel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Label {
        name: String,
        negated: bool,
    },
    Group {
        name: String,
        members: BTreeSet<String>,
        negated: bool,
    },
}

impl Term {
    pub fn name(&self) -> &str {
        match self {
            Term::Label { name, .. } | Term::Group { name, .. } => name,
        }
    }

    fn holds(&self, present: &HashSet<&str>) -> bool {
        match self {
            Term::Label { name, negated } => present.contains(name.as_str()) != *negated,
            Term::Group {
                members, negated, ..
            } => members.iter().any(|m| present.contains(m.as_str())) != *negated,
        }
    }
}

/// Disjunction of conjunctions. No clauses means "match everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewExpression {
    pub clauses: Vec<Vec<Term>>,
}

impl ViewExpression {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn evaluate<S: AsRef<str>>(&self, node_labels: &[S]) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        let present: HashSet<&str> = node_labels.iter().map(AsRef::as_ref).collect();
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|term| term.holds(&present)))
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.clauses.iter().flatten()
    }
}

/// Split into OR clauses of (name, negated) pairs.
fn tokenize(expression: &str) -> Result<Vec<Vec<(String, bool)>>, ExpressionError> {
    if expression.is_empty() {
        return Ok(Vec::new());
    }

    let mut clauses = Vec::new();
    for clause in expression.split(OR) {
        if clause.is_empty() {
            return Err(ExpressionError::EmptySubExpression);
        }

        let mut terms = Vec::new();
        for piece in clause.split(AND) {
            let piece = piece.trim();
            if piece.is_empty() || piece == "!" {
                return Err(ExpressionError::EmptySubExpression);
            }

            let (name, negated) = match piece.strip_prefix(NOT) {
                Some(rest) => (rest.trim(), true),
                None => (piece, false),
            };
            if name.contains(NOT) {
                return Err(ExpressionError::MisplacedNegation);
            }
            terms.push((name.to_string(), negated));
        }
        clauses.push(terms);
    }
    Ok(clauses)
}

pub fn parse_view_expression(expression: &str, labels: &[Label]) -> Result<ViewExpression, ExpressionError> {
    let tokens = tokenize(expression)?;
    let groups = labels::resolve_group_members(labels, false);

    let clauses = tokens
        .into_iter()
        .map(|clause| {
            clause
                .into_iter()
                .map(|(name, negated)| match groups.get(&name) {
                    Some(members) => Term::Group {
                        name,
                        members: members.clone(),
                        negated,
                    },
                    None => Term::Label { name, negated },
                })
                .collect()
        })
        .collect();

    Ok(ViewExpression { clauses })
}

/// Every label or group name mentioned in `expression`.
pub fn labels_in_expression(expression: &str) -> Result<BTreeSet<String>, ExpressionError> {
    Ok(tokenize(expression)?
        .into_iter()
        .flatten()
        .map(|(name, _)| name)
        .collect())
}

/// Parse and additionally require every name to be a defined label or group.
pub fn check_view_expression(expression: &str, labels: &[Label]) -> Validation {
    let result = parse_view_expression(expression, labels).and_then(|parsed| {
        match parsed
            .terms()
            .find(|t| !labels.iter().any(|l| l.name == t.name()))
        {
            Some(undefined) => Err(ExpressionError::UndefinedLabel(undefined.name().to_string())),
            None => Ok(()),
        }
    });

    match result {
        Ok(()) => Validation::ok(),
        Err(err) => Validation::invalid(err.to_string()),
    }
}

/// Nodes visible under `view`, in model order: direct matches, optionally
/// with their ancestors and their full subtrees (context nodes included).
pub fn apply_view<'a>(
    nodes: &'a [Node],
    labels: &[Label],
    view: &View,
) -> Result<Vec<&'a Node>, ExpressionError> {
    let expression = parse_view_expression(&view.expression, labels)?;
    if expression.is_empty() {
        return Ok(nodes.iter().collect());
    }

    let direct: Vec<&'a Node> = nodes
        .iter()
        .filter(|n| expression.evaluate(&n.labels))
        .collect();

    let mut keep: HashSet<&str> = direct.iter().map(|n| n.id.as_str()).collect();

    if view.include_parents || view.include_subtrees {
        let graph = RelationGraph::new(nodes);
        for node in &direct {
            if view.include_subtrees {
                keep.extend(graph.children(&node.id, true));
            }
            if view.include_parents {
                keep.extend(graph.parents(&node.id));
            }
        }
    }

    tracing::debug!(
        expression = %view.expression,
        direct = direct.len(),
        total = keep.len(),
        "applied view"
    );

    Ok(nodes.iter().filter(|n| keep.contains(n.id.as_str())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeType;
    use pretty_assertions::assert_eq;

    fn parse(expr: &str) -> ViewExpression {
        parse_view_expression(expr, &[]).unwrap()
    }

    #[test]
    fn empty_expression_matches_everything() {
        assert!(parse("").evaluate::<&str>(&[]));
        assert!(parse("").evaluate(&["x"]));
    }

    #[test]
    fn blank_expression_is_not_empty() {
        for blank in ["   ", "\t", " \n "] {
            assert_eq!(
                parse_view_expression(blank, &[]).unwrap_err(),
                ExpressionError::EmptySubExpression,
                "{:?}",
                blank
            );
        }
        let check = check_view_expression("  ", &[]);
        assert!(!check.valid);
        assert_eq!(check.hint, "Sub-expressions cannot be empty!");
    }

    #[test]
    fn negation_flips_plain_labels() {
        for labels in [vec![], vec!["X"], vec!["X", "Y"], vec!["Y"]] {
            assert_eq!(parse("!X").evaluate(&labels), !parse("X").evaluate(&labels));
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let e = parse("a && b || c");
        assert!(e.evaluate(&["a", "b"]));
        assert!(e.evaluate(&["c"]));
        assert!(!e.evaluate(&["a"]));
        assert!(parse("a && ! b").evaluate(&["a"]));
    }

    #[test]
    fn syntax_errors() {
        for bad in ["a ||", "|| a", "a && && b", "!", "a && !"] {
            assert_eq!(
                parse_view_expression(bad, &[]).unwrap_err(),
                ExpressionError::EmptySubExpression,
                "{:?}",
                bad
            );
        }
        assert_eq!(
            parse_view_expression("a!b", &[]).unwrap_err(),
            ExpressionError::MisplacedNegation
        );
        assert_eq!(
            parse_view_expression("!!a", &[]).unwrap_err(),
            ExpressionError::MisplacedNegation
        );
    }

    fn label_defs() -> Vec<Label> {
        vec![
            Label::label("a"),
            Label::label("b"),
            Label::label("c"),
            Label::group("G", &["a"], None),
            Label::group("H", &["b"], Some("G")),
        ]
    }

    #[test]
    fn groups_expand_to_resolved_members() {
        let labels = label_defs();
        let e = parse_view_expression("G", &labels).unwrap();
        assert!(e.evaluate(&["b"]));
        assert!(!e.evaluate(&["c"]));

        let e = parse_view_expression("!G", &labels).unwrap();
        assert!(e.evaluate(&["c"]));
        assert!(!e.evaluate(&["a", "c"]));

        let e = parse_view_expression("*", &labels).unwrap();
        assert!(e.evaluate(&["c"]));
        assert!(!e.evaluate::<&str>(&[]));
    }

    #[test]
    fn check_reports_undefined_names() {
        let labels = label_defs();
        assert!(check_view_expression("a && !H", &labels).valid);
        assert_eq!(
            check_view_expression("a && zzz", &labels).hint,
            "Lacking label/group definition for \"zzz\""
        );
        assert_eq!(
            check_view_expression("a &&", &labels).hint,
            "Sub-expressions cannot be empty!"
        );
    }

    #[test]
    fn labels_in_expression_strips_negation() {
        let names = labels_in_expression("a && !b || !a").unwrap();
        assert_eq!(names, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    fn model() -> Vec<Node> {
        let mut g1 = Node::new("m/G1", NodeType::Goal);
        g1.solved_by = vec!["m/G1/G2".to_string()];
        let mut g2 = Node::new("m/G1/G2", NodeType::Goal);
        g2.labels = vec!["a".to_string()];
        g2.solved_by = vec!["m/G1/G2/Sn1".to_string()];
        g2.in_context_of = vec!["m/G1/G2/C1".to_string()];
        let c1 = Node::new("m/G1/G2/C1", NodeType::Context);
        let sn1 = Node::new("m/G1/G2/Sn1", NodeType::Solution);
        let other = Node::new("m/X", NodeType::Goal);
        vec![g1, g2, c1, sn1, other]
    }

    fn ids(nodes: Vec<&Node>) -> Vec<&str> {
        nodes.into_iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn apply_view_unions_parents_and_subtrees_in_model_order() {
        let nodes = model();
        let labels = label_defs();

        let mut view = View::new("a");
        assert_eq!(ids(apply_view(&nodes, &labels, &view).unwrap()), vec!["m/G1/G2"]);

        view.include_subtrees = true;
        assert_eq!(
            ids(apply_view(&nodes, &labels, &view).unwrap()),
            vec!["m/G1/G2", "m/G1/G2/C1", "m/G1/G2/Sn1"]
        );

        view.include_parents = true;
        assert_eq!(
            ids(apply_view(&nodes, &labels, &view).unwrap()),
            vec!["m/G1", "m/G1/G2", "m/G1/G2/C1", "m/G1/G2/Sn1"]
        );

        assert_eq!(apply_view(&nodes, &labels, &View::new("")).unwrap().len(), 5);
    }
}
