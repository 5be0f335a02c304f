//! Cycle reporting for rejected plans.
//!
//! # Edge Direction
//!
//! The store graph uses edge direction `blocker → blocked`. A plan is
//! rejected at load time as soon as the topological sort leaves items
//! unvisited; these helpers turn that failure into a list of the strongly
//! connected components responsible, so the operator can see which links
//! to drop.

#![allow(clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// Find all cycles currently present in `graph`.
///
/// Each entry is a sorted list of item IDs in one strongly connected
/// component (SCC). Self-loops are reported as a one-element cycle.
#[must_use]
pub fn find_all_cycles(graph: &DiGraph<String, ()>) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = tarjan_scc(graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || component.first().is_some_and(|node| has_self_loop(graph, *node))
        })
        .map(|component| {
            let mut ids: Vec<String> = component.into_iter().map(|idx| node_id(graph, idx)).collect();
            ids.sort_unstable();
            ids
        })
        .collect();

    cycles.sort_unstable();
    cycles
}

/// Return one concrete loop through `start`, formatted `start -> ... -> start`.
///
/// Returns `None` when `start` is not on any cycle.
#[must_use]
pub fn cycle_path_through(graph: &DiGraph<String, ()>, start: NodeIndex) -> Option<Vec<String>> {
    if has_self_loop(graph, start) {
        let id = node_id(graph, start);
        return Some(vec![id.clone(), id]);
    }

    // BFS from the successors of `start` looking for `start` again.
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    for edge in graph.edges(start) {
        let next = edge.target();
        if visited.insert(next) {
            parent.insert(next, start);
            queue.push_back(next);
        }
    }

    while let Some(current) = queue.pop_front() {
        for edge in graph.edges(current) {
            let next = edge.target();
            if next == start {
                return Some(reconstruct_path(graph, start, current, &parent));
            }
            if visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }

    None
}

#[must_use]
fn has_self_loop(graph: &DiGraph<String, ()>, node: NodeIndex) -> bool {
    graph.find_edge(node, node).is_some()
}

fn reconstruct_path(
    graph: &DiGraph<String, ()>,
    start: NodeIndex,
    last: NodeIndex,
    parent: &HashMap<NodeIndex, NodeIndex>,
) -> Vec<String> {
    // Parent links run last -> ... -> start; walk them back and reverse.
    let mut reversed: Vec<NodeIndex> = vec![last];
    let mut cursor = last;
    while cursor != start {
        match parent.get(&cursor) {
            Some(prev) => {
                cursor = *prev;
                reversed.push(cursor);
            }
            None => break,
        }
    }
    reversed.reverse();

    let mut path: Vec<String> = reversed.into_iter().map(|idx| node_id(graph, idx)).collect();
    path.push(node_id(graph, start));
    path
}

pub(crate) fn node_id(graph: &DiGraph<String, ()>, idx: NodeIndex) -> String {
    graph
        .node_weight(idx)
        .cloned()
        .unwrap_or_else(|| format!("#{}", idx.index()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_from(edges: &[(&str, &str)]) -> (DiGraph<String, ()>, HashMap<String, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        for (from, to) in edges {
            for id in [*from, *to] {
                nodes
                    .entry(id.to_string())
                    .or_insert_with(|| graph.add_node(id.to_string()));
            }
            graph.add_edge(nodes[*from], nodes[*to], ());
        }
        (graph, nodes)
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let (graph, _) = graph_from(&[("a", "b"), ("b", "c"), ("a", "c")]);
        assert!(find_all_cycles(&graph).is_empty());
    }

    #[test]
    fn three_node_cycle_is_one_component() {
        let (graph, _) = graph_from(&[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(
            find_all_cycles(&graph),
            vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]
        );
    }

    #[test]
    fn self_loop_is_reported() {
        let (graph, nodes) = graph_from(&[("a", "a"), ("a", "b")]);
        assert_eq!(find_all_cycles(&graph), vec![vec!["a".to_string()]]);
        assert_eq!(
            cycle_path_through(&graph, nodes["a"]),
            Some(vec!["a".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn disjoint_cycles_are_sorted() {
        let (graph, _) = graph_from(&[("x", "y"), ("y", "x"), ("b", "a"), ("a", "b")]);
        let cycles = find_all_cycles(&graph);
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cycles[1], vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn cycle_path_walks_back_to_start() {
        let (graph, nodes) = graph_from(&[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d")]);
        let path = cycle_path_through(&graph, nodes["a"]).expect("a is on a cycle");
        assert_eq!(path, vec!["a", "b", "c", "a"]);
        assert!(cycle_path_through(&graph, nodes["d"]).is_none());
    }
}
