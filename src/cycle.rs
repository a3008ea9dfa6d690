//! Acyclicity check over all relations.
//!
//! Every `solvedBy` / `inContextOf` entry is an edge, containment and
//! reference alike. Targets missing from the slice still become vertices so
//! a dangling id never hides a loop through the remaining nodes.

use crate::model::Node;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

fn build_graph(nodes: &[Node]) -> DiGraph<&str, ()> {
    let mut graph = DiGraph::new();
    let mut vertex: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        let idx = graph.add_node(node.id.as_str());
        vertex.insert(node.id.as_str(), idx);
    }

    for node in nodes {
        let from = vertex[node.id.as_str()];
        for (_, child) in node.relations() {
            let to = *vertex
                .entry(child)
                .or_insert_with(|| graph.add_node(child));
            graph.add_edge(from, to, ());
        }
    }

    graph
}

/// Strongly connected components of size > 1, each as a sorted id list.
/// Components are ordered by their first id.
pub fn find_cycles(nodes: &[Node]) -> Vec<Vec<String>> {
    let graph = build_graph(nodes);

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut ids: Vec<String> = scc.iter().map(|&i| graph[i].to_string()).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();

    if !cycles.is_empty() {
        tracing::debug!(cycles = cycles.len(), "relation graph is not a DAG");
    }
    cycles
}

pub fn count_cycles(nodes: &[Node]) -> usize {
    find_cycles(nodes).len()
}

pub fn has_cycles(nodes: &[Node]) -> bool {
    count_cycles(nodes) > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeType;
    use pretty_assertions::assert_eq;

    fn goal(id: &str, solved_by: &[&str]) -> Node {
        let mut n = Node::new(id, NodeType::Goal);
        n.solved_by = solved_by.iter().map(|s| s.to_string()).collect();
        n
    }

    #[test]
    fn three_node_loop_is_found_and_removing_an_edge_breaks_it() {
        let mut nodes = vec![
            goal("m/A", &["m/B"]),
            goal("m/B", &["m/C"]),
            goal("m/C", &["m/A"]),
        ];
        assert!(has_cycles(&nodes));
        assert_eq!(find_cycles(&nodes), vec![vec!["m/A", "m/B", "m/C"]]);

        nodes[2].solved_by.clear();
        assert!(!has_cycles(&nodes));
    }

    #[test]
    fn context_edges_close_loops_too() {
        let mut a = goal("m/A", &[]);
        a.in_context_of = vec!["m/B".to_string()];
        let b = goal("m/B", &["m/A"]);
        assert_eq!(count_cycles(&[a, b]), 1);
    }

    #[test]
    fn counts_disjoint_loops_and_ignores_dangling_targets() {
        let nodes = vec![
            goal("m/A", &["m/B", "m/missing"]),
            goal("m/B", &["m/A"]),
            goal("n/X", &["n/Y"]),
            goal("n/Y", &["n/X"]),
            goal("n/Z", &[]),
        ];
        assert_eq!(count_cycles(&nodes), 2);
    }

    #[test]
    fn tree_is_acyclic() {
        let nodes = vec![
            goal("m/G1", &["m/G1/G2", "m/G1/G3"]),
            goal("m/G1/G2", &["m/G1/G3"]),
            goal("m/G1/G3", &[]),
        ];
        assert!(!has_cycles(&nodes));
    }
}
