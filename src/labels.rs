//! Labels and label groups.
//!
//! Labels are plain names attached to nodes. Groups are named sets of
//! labels arranged in a forest through `parent`; a group's resolved
//! membership is its declared members plus everything declared in the
//! groups underneath it. The implicit root group `*` holds every non-group
//! label.

use crate::Result;
use crate::diagnostics;
use crate::edit::{AttrValue, Change};
use crate::model::{Node, id};
use crate::view::{View, labels_in_expression};

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const UNIVERSE: &str = "*";

/// Operator symbols of the view language; none may appear in a name.
pub const RESERVED_SYMBOLS: [&str; 6] = ["&&", "||", "!", "(", ")", UNIVERSE];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub name: String,

    #[serde(default)]
    pub is_group: bool,

    #[serde(default)]
    pub description: String,

    /// Declared members (groups only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,

    /// Parent group (groups only).
    #[serde(default)]
    pub parent: Option<String>,
}

impl Label {
    pub fn label(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_group: false,
            description: String::new(),
            members: Vec::new(),
            parent: None,
        }
    }

    pub fn group(name: impl Into<String>, members: &[&str], parent: Option<&str>) -> Self {
        Self {
            name: name.into(),
            is_group: true,
            description: String::new(),
            members: members.iter().map(|m| m.to_string()).collect(),
            parent: parent.map(str::to_string),
        }
    }
}

pub type GroupMembers = BTreeMap<String, BTreeSet<String>>;

/// Resolved membership per group, plus `*`.
///
/// With `inherited_only` a group's own declared members are left out of its
/// own set (they still reach its ancestors).
pub fn resolve_group_members(labels: &[Label], inherited_only: bool) -> GroupMembers {
    let mut resolved = GroupMembers::new();
    resolved.insert(UNIVERSE.to_string(), BTreeSet::new());

    let mut groups: HashMap<&str, &Label> = HashMap::new();

    for label in labels {
        if label.is_group {
            let seed = if inherited_only {
                BTreeSet::new()
            } else {
                label.members.iter().cloned().collect()
            };
            resolved.insert(label.name.clone(), seed);
            groups.insert(label.name.as_str(), label);
        } else if let Some(universe) = resolved.get_mut(UNIVERSE) {
            universe.insert(label.name.clone());
        }
    }

    for group in labels.iter().filter(|l| l.is_group) {
        let mut visited = HashSet::from([group.name.as_str()]);
        let mut cursor = group.parent.as_deref();

        while let Some(parent) = cursor {
            if !visited.insert(parent) {
                diagnostics::warn(format!("label group parents loop through \"{}\"", parent));
                break;
            }
            let Some(set) = resolved.get_mut(parent) else {
                diagnostics::warn(format!(
                    "label group \"{}\" has unknown parent \"{}\"",
                    group.name, parent
                ));
                break;
            };
            set.extend(group.members.iter().cloned());
            cursor = groups.get(parent).and_then(|g| g.parent.as_deref());
        }
    }

    resolved
}

/// True if making `candidate_parent` the parent of `group` would close a
/// loop in the group forest.
pub fn would_create_group_cycle(labels: &[Label], group: &str, candidate_parent: &str) -> bool {
    let parents: HashMap<&str, Option<&str>> = labels
        .iter()
        .filter(|l| l.is_group)
        .map(|l| (l.name.as_str(), l.parent.as_deref()))
        .collect();

    let mut visited = HashSet::new();
    let mut cursor = Some(candidate_parent);
    while let Some(current) = cursor {
        if current == group || !visited.insert(current) {
            return true;
        }
        cursor = parents.get(current).copied().flatten();
    }
    false
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub hint: String,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            hint: String::new(),
        }
    }

    pub fn invalid(hint: impl Into<String>) -> Self {
        Self {
            valid: false,
            hint: hint.into(),
        }
    }
}

pub fn is_valid_label_name(name: &str) -> Validation {
    if name.is_empty() {
        return Validation::invalid("Cannot be an empty.");
    }

    if RESERVED_SYMBOLS.iter().any(|s| name.contains(s)) {
        let quoted: Vec<String> = RESERVED_SYMBOLS.iter().map(|s| format!("\"{}\"", s)).collect();
        return Validation::invalid(format!("Cannot contain {}.", quoted.join(", ")));
    }

    if !id::is_valid_name(name) {
        return Validation::invalid(id::NAME_HINT);
    }

    Validation::ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelUsage {
    pub in_nodes_count: BTreeMap<String, usize>,
    pub in_views_count: BTreeMap<String, usize>,
}

/// How many nodes carry each label and how many views mention each name.
/// Views whose expression does not parse are skipped.
pub fn label_usage_counts(nodes: &[Node], views: &[View]) -> LabelUsage {
    let mut usage = LabelUsage::default();

    for label in nodes.iter().flat_map(|n| n.labels.iter()) {
        *usage.in_nodes_count.entry(label.clone()).or_default() += 1;
    }

    for view in views {
        match labels_in_expression(&view.expression) {
            Ok(names) => {
                for name in names {
                    *usage.in_views_count.entry(name).or_default() += 1;
                }
            }
            Err(err) => diagnostics::warn(format!(
                "skipping view {:?} in usage counts: {}",
                view.name.as_deref().unwrap_or_default(),
                err
            )),
        }
    }

    usage
}

fn label_changes(nodes: &[Node], name: &str, rewrite: impl Fn(&[String]) -> Vec<String>) -> Vec<Change> {
    nodes
        .iter()
        .filter(|n| n.labels.iter().any(|l| l == name))
        .map(|n| Change::AttributeChange {
            node_id: n.id.clone(),
            attr: "labels".to_string(),
            new_value: AttrValue::List(rewrite(&n.labels)),
        })
        .collect()
}

/// Node label rewrites implied by deleting label `name`.
pub fn delete_label_implications(nodes: &[Node], name: &str) -> Vec<Change> {
    label_changes(nodes, name, |labels| {
        labels.iter().filter(|l| *l != name).cloned().collect()
    })
}

/// Node label rewrites implied by renaming label `old_name` to `new_name`.
pub fn rename_label_implications(nodes: &[Node], new_name: &str, old_name: &str) -> Vec<Change> {
    label_changes(nodes, old_name, |labels| {
        labels
            .iter()
            .map(|l| if l == old_name { new_name.to_string() } else { l.clone() })
            .collect()
    })
}

fn find<'a>(labels: &'a [Label], name: &str) -> Result<&'a Label> {
    match labels.iter().find(|l| l.name == name) {
        Some(label) => Ok(label),
        None => bail!("label \"{}\" is not defined", name),
    }
}

/// Label definitions after removing `name`. Child groups of a deleted group
/// become roots; a deleted plain label is dropped from group members.
pub fn labels_after_deletion(labels: &[Label], name: &str) -> Result<Vec<Label>> {
    let deleted_group = find(labels, name)?.is_group;

    Ok(labels
        .iter()
        .filter(|l| l.name != name)
        .map(|l| {
            let mut l = l.clone();
            if l.is_group {
                if deleted_group && l.parent.as_deref() == Some(name) {
                    l.parent = None;
                } else if !deleted_group {
                    l.members.retain(|m| m != name);
                }
            }
            l
        })
        .collect())
}

/// Label definitions after replacing `old_name` with `new_label`, following
/// the rename into parents and members.
pub fn labels_after_renaming(labels: &[Label], new_label: &Label, old_name: &str) -> Result<Vec<Label>> {
    let renamed_group = find(labels, old_name)?.is_group;

    Ok(labels
        .iter()
        .map(|l| {
            if l.name == old_name {
                return new_label.clone();
            }
            let mut l = l.clone();
            if l.is_group {
                if renamed_group && l.parent.as_deref() == Some(old_name) {
                    l.parent = Some(new_label.name.clone());
                } else if !renamed_group {
                    for m in l.members.iter_mut().filter(|m| *m == old_name) {
                        *m = new_label.name.clone();
                    }
                }
            }
            l
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeType;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn universe_holds_every_plain_label() {
        let labels = vec![
            Label::label("a"),
            Label::label("b"),
            Label::group("g", &["a"], None),
        ];
        let resolved = resolve_group_members(&labels, false);
        assert_eq!(resolved[UNIVERSE], set(&["a", "b"]));
        assert_eq!(resolved["g"], set(&["a"]));
    }

    #[test]
    fn chain_of_groups_shares_the_member() {
        let labels = vec![
            Label::label("x"),
            Label::group("A", &["x"], None),
            Label::group("B", &["x"], Some("A")),
            Label::group("C", &["x"], Some("B")),
        ];
        let resolved = resolve_group_members(&labels, false);
        for g in ["A", "B", "C"] {
            assert_eq!(resolved[g], set(&["x"]), "group {}", g);
        }
    }

    #[test]
    fn members_propagate_to_every_ancestor_only() {
        let labels = vec![
            Label::group("A", &["a"], None),
            Label::group("B", &["b"], Some("A")),
            Label::group("C", &["c"], Some("B")),
        ];
        let resolved = resolve_group_members(&labels, false);
        assert_eq!(resolved["A"], set(&["a", "b", "c"]));
        assert_eq!(resolved["B"], set(&["b", "c"]));
        assert_eq!(resolved["C"], set(&["c"]));

        let inherited = resolve_group_members(&labels, true);
        assert_eq!(inherited["A"], set(&["b", "c"]));
        assert_eq!(inherited["C"], set(&[]));
    }

    #[test]
    fn missing_parent_and_loops_terminate() {
        let labels = vec![
            Label::group("A", &["a"], Some("nope")),
            Label::group("B", &["b"], Some("C")),
            Label::group("C", &["c"], Some("B")),
        ];
        let resolved = resolve_group_members(&labels, false);
        assert_eq!(resolved["A"], set(&["a"]));
        assert_eq!(resolved["B"], set(&["b", "c"]));
    }

    #[test]
    fn group_cycle_guard_walks_ancestors() {
        let labels = vec![
            Label::group("A", &[], None),
            Label::group("B", &[], Some("A")),
            Label::group("C", &[], Some("B")),
        ];
        assert!(would_create_group_cycle(&labels, "A", "C"));
        assert!(would_create_group_cycle(&labels, "A", "A"));
        assert!(!would_create_group_cycle(&labels, "C", "A"));
    }

    #[test]
    fn label_names_reject_operators() {
        assert!(is_valid_label_name("safety_1").valid);
        assert_eq!(is_valid_label_name("").hint, "Cannot be an empty.");
        assert!(is_valid_label_name("a&&b").hint.starts_with("Cannot contain \"&&\""));
        assert_eq!(is_valid_label_name("1abc").hint, id::NAME_HINT);
    }

    fn labelled(id: &str, labels: &[&str]) -> Node {
        let mut n = Node::new(id, NodeType::Goal);
        n.labels = labels.iter().map(|s| s.to_string()).collect();
        n
    }

    #[test]
    fn usage_counts_cover_nodes_and_views() {
        let nodes = vec![labelled("m/G1", &["a", "b"]), labelled("m/G2", &["a"])];
        let views = vec![
            View::new("a && !b"),
            View::new("a || c"),
            View::new("&& broken"),
        ];
        let usage = label_usage_counts(&nodes, &views);
        assert_eq!(usage.in_nodes_count["a"], 2);
        assert_eq!(usage.in_nodes_count["b"], 1);
        assert_eq!(usage.in_views_count["a"], 2);
        assert_eq!(usage.in_views_count["c"], 1);
    }

    #[test]
    fn rename_and_delete_rewrite_node_labels() {
        let nodes = vec![labelled("m/G1", &["a", "b"]), labelled("m/G2", &["b"])];
        assert_eq!(
            delete_label_implications(&nodes, "a"),
            vec![Change::AttributeChange {
                node_id: "m/G1".to_string(),
                attr: "labels".to_string(),
                new_value: AttrValue::List(vec!["b".to_string()]),
            }]
        );
        assert_eq!(rename_label_implications(&nodes, "z", "b").len(), 2);
    }

    #[test]
    fn definitions_follow_deletes_and_renames() {
        let labels = vec![
            Label::label("a"),
            Label::group("A", &["a"], None),
            Label::group("B", &["a"], Some("A")),
        ];

        let after = labels_after_deletion(&labels, "a").unwrap();
        assert_eq!(after.len(), 2);
        assert!(after.iter().all(|l| l.members.is_empty()));

        let after = labels_after_deletion(&labels, "A").unwrap();
        assert_eq!(after[1].parent, None);

        let after = labels_after_renaming(&labels, &Label::group("Top", &["a"], None), "A").unwrap();
        assert_eq!(after[2].parent.as_deref(), Some("Top"));

        let after = labels_after_renaming(&labels, &Label::label("aa"), "a").unwrap();
        assert_eq!(after[1].members, vec!["aa"]);

        assert!(labels_after_deletion(&labels, "missing").is_err());
    }
}
