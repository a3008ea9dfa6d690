//! JSON model -> `.gsn` text.
//!
//! Phase 1: record validation (ids, types, duplicates).
//! Phase 2: values the text form cannot carry (labels, quoted strings).
//! Phase 3: group by namespace; roots are the `ns/name` nodes.
//! Phase 4: walk containment from the roots, classifying every relation entry
//!          as a nested child or a reference.
//! Phase 5: acyclicity over all relations.
//!
//! Errors from every phase that ran are collected; any error means no text.

use crate::cycle;
use crate::model::error::MODEL_WIDE;
use crate::model::{Model, ModelError, ModelErrors, Node, NodeType, RawNode, id, raw};
use crate::text::REF_PREFIX;

use std::collections::{BTreeMap, HashSet};

/// A node placed in its namespace tree.
#[derive(Debug, Clone)]
pub struct TextNode {
    /// Record with the uuid filled in.
    pub node: Node,
    pub children: Vec<TextNode>,
    /// (target type, target id) for every reference edge, sorted by id.
    pub references: Vec<(NodeType, String)>,
}

#[derive(Debug, Clone)]
pub struct Namespace {
    pub name: String,
    /// Keyword type of the block, taken from the last root.
    pub kind: NodeType,
    pub roots: Vec<TextNode>,
}

/// Validate raw records and arrange them into namespace trees.
pub fn populate_namespaces(records: &[RawNode]) -> Result<Vec<Namespace>, ModelErrors> {
    let model = raw::validate_and_build(records)?;
    namespaces_of(&model)
}

/// Arrange an already validated model into namespace trees.
pub fn namespaces_of(model: &Model) -> Result<Vec<Namespace>, ModelErrors> {
    let mut errors = unwritable_values(model);

    // Namespaces in order of first appearance.
    let mut order: Vec<&str> = Vec::new();
    let mut roots: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, node) in model.nodes().iter().enumerate() {
        let ns = id::namespace_of(&node.id);
        if !roots.contains_key(ns) {
            order.push(ns);
            roots.insert(ns, Vec::new());
        }
        if id::depth(&node.id) == 2 {
            roots.entry(ns).or_default().push(idx);
        }
    }

    let mut visited: HashSet<usize> = HashSet::new();
    let mut namespaces = Vec::with_capacity(order.len());

    for ns in &order {
        let ns_roots = roots.get(ns).cloned().unwrap_or_default();
        let Some(&last_root) = ns_roots.last() else {
            errors.push(ModelError::new(
                format!("Namespace \"{}\" does not have any root-nodes", ns),
                "All nodes need to be accounted for in the model.",
                0,
            ));
            continue;
        };

        let trees = ns_roots
            .iter()
            .map(|&idx| build_tree(model, idx, &mut visited, &mut errors))
            .collect();

        namespaces.push(Namespace {
            name: ns.to_string(),
            kind: model.node(last_root).kind,
            roots: trees,
        });
    }

    // Nodes inside a rooted namespace that no container lists.
    let rooted: HashSet<&str> = order
        .iter()
        .copied()
        .filter(|ns| roots.get(ns).is_some_and(|r| !r.is_empty()))
        .collect();
    for (idx, node) in model.nodes().iter().enumerate() {
        if visited.contains(&idx) || !rooted.contains(id::namespace_of(&node.id)) {
            continue;
        }
        let hint = match model.container_of(idx) {
            Some(container) => format!(
                "List the node in solvedBy or inContextOf of \"{}\"",
                model.node(container).id
            ),
            None => format!("Container \"{}\" is not in the model", id::parent_id(&node.id)),
        };
        errors.push(
            ModelError::new(
                format!("Node \"{}\" is not contained by any node", node.id),
                hint,
                idx as i64,
            )
            .at_node(node.id.clone())
            .with_details(serde_json::to_string_pretty(node).unwrap_or_default()),
        );
    }

    let loops = cycle::count_cycles(model.nodes());
    if loops > 0 {
        errors.insert(
            0,
            ModelError::new(
                format!("Model is not a DAG, it forms {} loop(s).", loops),
                "Remove relationships to break the loops.",
                MODEL_WIDE,
            ),
        );
    }

    if !errors.is_empty() {
        return Err(ModelErrors(errors));
    }
    Ok(namespaces)
}

/// Labels are written bare and must be names; uuids and artifacts are
/// written in double quotes without escaping.
fn unwritable_values(model: &Model) -> Vec<ModelError> {
    let mut errors = Vec::new();
    for (idx, node) in model.nodes().iter().enumerate() {
        let error = |message: String, hint: &str| {
            ModelError::new(message, hint, idx as i64)
                .at_node(node.id.clone())
                .with_details(serde_json::to_string_pretty(node).unwrap_or_default())
        };

        for label in node.labels.iter().filter(|l| !id::is_valid_name(l)) {
            errors.push(error(
                format!("Label \"{}\" cannot be written as text", label),
                id::NAME_HINT,
            ));
        }
        for artifact in node.artifacts.iter().filter(|a| a.contains('"')) {
            errors.push(error(
                format!("Artifact \"{}\" contains a double quote", artifact),
                "Artifacts are written in double quotes and must not contain '\"'.",
            ));
        }
        if let Some(uuid) = node.uuid.as_deref().filter(|u| u.contains('"')) {
            errors.push(error(
                format!("uuid \"{}\" contains a double quote", uuid),
                "uuids are written in double quotes and must not contain '\"'.",
            ));
        }
    }
    errors
}

fn build_tree(
    model: &Model,
    idx: usize,
    visited: &mut HashSet<usize>,
    errors: &mut Vec<ModelError>,
) -> TextNode {
    visited.insert(idx);
    let source = model.node(idx);

    let mut node = source.clone();
    if node.uuid.is_none() {
        node.uuid = Some(uuid::Uuid::new_v4().to_string());
    }

    let mut relations: Vec<&str> = source.relations().map(|(_, c)| c).collect();
    relations.sort_unstable();

    let mut children = Vec::new();
    let mut references = Vec::new();

    for child_id in relations {
        let Some(child_idx) = model.index_of(child_id) else {
            errors.push(
                ModelError::new(
                    format!("Referenced node \"{}\" does not exist", child_id),
                    "inContextOf and solvedBy must only contain ids of existing nodes",
                    idx as i64,
                )
                .at_node(source.id.clone())
                .with_details(serde_json::to_string_pretty(source).unwrap_or_default()),
            );
            continue;
        };

        if model.is_contained_by(idx, child_idx) {
            if visited.contains(&child_idx) {
                continue;
            }
            children.push(build_tree(model, child_idx, visited, errors));
        } else {
            references.push((model.node(child_idx).kind, child_id.to_string()));
        }
    }

    TextNode {
        node,
        children,
        references,
    }
}

struct Writer<'a> {
    lines: Vec<String>,
    indent: &'a str,
    depth: usize,
}

impl Writer<'_> {
    fn line(&mut self, text: impl AsRef<str>) {
        self.lines
            .push(format!("{}{}", self.indent.repeat(self.depth), text.as_ref()));
    }

    fn node(&mut self, tn: &TextNode) {
        let node = &tn.node;
        self.line(format!("{} {}", node.kind.keyword(), node.name()));
        self.line("{");
        self.depth += 1;

        self.line(format!("uuid:\"{}\";", node.uuid.as_deref().unwrap_or_default()));
        if let Some(summary) = node.summary.as_deref().filter(|s| !s.is_empty()) {
            self.line(format!("summary:'''{}''';", summary));
        }
        if let Some(info) = node.info.as_deref().filter(|s| !s.is_empty()) {
            self.line(format!("info:'''{}''';", info));
        }
        for label in &node.labels {
            self.line(format!("label:{};", label));
        }
        for artifact in &node.artifacts {
            self.line(format!("artifact:\"{}\";", artifact));
        }
        for child in &tn.children {
            self.node(child);
        }
        for (kind, target) in &tn.references {
            self.line(format!(
                "{}{}: {};",
                REF_PREFIX,
                kind.keyword(),
                target.replace(id::SEPARATOR, ".")
            ));
        }

        self.depth -= 1;
        self.line("}");
    }
}

fn render_namespace(ns: &Namespace, indent: &str) -> String {
    let mut w = Writer {
        lines: Vec::new(),
        indent,
        depth: 0,
    };
    w.line(format!("{} {}", ns.kind.namespace_keyword(), ns.name));
    w.line("{");
    w.depth += 1;
    for root in &ns.roots {
        w.node(root);
    }
    w.depth -= 1;
    w.line("}\n");
    w.lines.join("\n")
}

fn render_all(namespaces: &[Namespace], indent: usize) -> BTreeMap<String, String> {
    let indent = " ".repeat(indent);
    namespaces
        .iter()
        .map(|ns| (ns.name.clone(), render_namespace(ns, &indent)))
        .collect()
}

/// Text per namespace name.
pub fn to_text(records: &[RawNode], indent: usize) -> Result<BTreeMap<String, String>, ModelErrors> {
    Ok(render_all(&populate_namespaces(records)?, indent))
}

pub fn model_to_text(model: &Model, indent: usize) -> Result<BTreeMap<String, String>, ModelErrors> {
    Ok(render_all(&namespaces_of(model)?, indent))
}

/// All namespace blocks in one file, in namespace name order.
pub fn to_single_file(contents: &BTreeMap<String, String>) -> String {
    contents.values().cloned().collect::<Vec<_>>().join("\n")
}
