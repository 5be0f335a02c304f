//! The graph store: canonical work items plus their blocking edges.
//!
//! # Edge Direction
//!
//! An edge `A → B` in the graph means "A **blocks** B": A must be `Done`
//! before B can start. [`GraphStore::blockers_of`] follows incoming edges,
//! [`GraphStore::dependents_of`] follows outgoing ones.
//!
//! # Load-time validation
//!
//! [`GraphStore::load`] rejects duplicate ids, edges that name an id missing
//! from the item list, and cyclic edge sets. Cycles are found with a Kahn
//! topological sort: any item still unvisited once every in-degree-0 item has
//! been drained sits on (or behind) a cycle.
//!
//! # Content hash
//!
//! The store carries a BLAKE3 hash of the sorted item ids and edges. Run
//! snapshots record it so a saved state is never applied to a different plan.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{instrument, warn};

use crate::error::SequenceError;
use crate::graph::cycles::{cycle_path_through, find_all_cycles, node_id};
use crate::model::item::{BlockingEdge, WorkItem};

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

/// Owns every [`WorkItem`] and [`BlockingEdge`] for one sequencing run.
///
/// The edge set is immutable once loaded. Item state changes only through
/// the lifecycle operations in [`crate::sequencer`], which receive the store
/// by mutable reference.
#[derive(Debug, Clone)]
pub struct GraphStore {
    /// Directed graph: nodes = item IDs, edges = blocking relationships.
    graph: DiGraph<String, ()>,
    /// Mapping from item ID to petgraph `NodeIndex`.
    node_map: HashMap<String, NodeIndex>,
    /// Canonical item records, keyed (and therefore iterated) by ascending id.
    items: BTreeMap<String, WorkItem>,
    /// Deterministic topological order, ties broken by ascending id.
    order: Vec<String>,
    /// BLAKE3 content hash of the id and edge sets.
    content_hash: String,
}

impl GraphStore {
    /// Build the store from item ids and blocking edges.
    ///
    /// Duplicate edges collapse into one. A self-edge is a one-item cycle.
    ///
    /// # Errors
    ///
    /// - [`SequenceError::DuplicateItem`] if an id is listed twice.
    /// - [`SequenceError::UnknownReference`] if an edge endpoint is not an item.
    /// - [`SequenceError::Cycle`] if the edges do not form a DAG.
    #[instrument(skip_all)]
    pub fn load<I, S>(items: I, edges: &[BlockingEdge]) -> Result<Self, SequenceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = DiGraph::<String, ()>::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();
        let mut records: BTreeMap<String, WorkItem> = BTreeMap::new();

        for id in items {
            let id: String = id.into();
            if records.contains_key(&id) {
                return Err(SequenceError::DuplicateItem(id));
            }
            let idx = graph.add_node(id.clone());
            node_map.insert(id.clone(), idx);
            records.insert(id.clone(), WorkItem::new(id));
        }

        let mut unique_edges: BTreeSet<&BlockingEdge> = BTreeSet::new();
        for edge in edges {
            let Some(&blocker_idx) = node_map.get(&edge.blocker) else {
                return Err(unknown_reference(edge, &edge.blocker));
            };
            let Some(&blocked_idx) = node_map.get(&edge.blocked) else {
                return Err(unknown_reference(edge, &edge.blocked));
            };
            if unique_edges.insert(edge) {
                graph.add_edge(blocker_idx, blocked_idx, ());
            }
        }

        let order = topological_order(&graph)?;
        let content_hash = compute_content_hash(records.keys(), &unique_edges);

        tracing::debug!(
            items = records.len(),
            edges = unique_edges.len(),
            hash = %content_hash,
            "graph store loaded"
        );

        Ok(Self {
            graph,
            node_map,
            items: records,
            order,
            content_hash,
        })
    }

    /// Return the ids that must be `Done` before `id` may start.
    ///
    /// Returns an empty set if the item has no blockers or is not known.
    #[must_use]
    pub fn blockers_of(&self, id: &str) -> BTreeSet<&str> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Return the ids that cannot start until `id` is `Done`.
    ///
    /// Returns an empty set if nothing depends on the item or it is not known.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> BTreeSet<&str> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Look up one item record.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&WorkItem> {
        self.items.get(id)
    }

    pub(crate) fn item_mut(&mut self, id: &str) -> Option<&mut WorkItem> {
        self.items.get_mut(id)
    }

    /// Iterate every item in ascending id order.
    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.values()
    }

    /// Iterate every item id in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Return `true` if `id` names an item in this store.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Return `true` if the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct blocking edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All blocking edges, sorted by `(blocker, blocked)`.
    #[must_use]
    pub fn edges(&self) -> Vec<BlockingEdge> {
        let mut edges: Vec<BlockingEdge> = self
            .graph
            .raw_edges()
            .iter()
            .map(|edge| {
                BlockingEdge::new(
                    node_id(&self.graph, edge.source()),
                    node_id(&self.graph, edge.target()),
                )
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Topological order of all items; ties broken by ascending id.
    #[must_use]
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// BLAKE3 hash of the item ids and edges (`blake3:<hex>`).
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn neighbors(&self, id: &str, direction: Direction) -> BTreeSet<&str> {
        let Some(&idx) = self.node_map.get(id) else {
            return BTreeSet::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.graph.node_weight(n).map(String::as_str))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn unknown_reference(edge: &BlockingEdge, missing: &str) -> SequenceError {
    SequenceError::UnknownReference {
        blocker: edge.blocker.clone(),
        blocked: edge.blocked.clone(),
        missing: missing.to_string(),
    }
}

/// Kahn's algorithm with a sorted frontier so the order is reproducible.
fn topological_order(graph: &DiGraph<String, ()>) -> Result<Vec<String>, SequenceError> {
    let mut indegree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| (idx, graph.neighbors_directed(idx, Direction::Incoming).count()))
        .collect();

    let mut frontier: BTreeSet<(String, NodeIndex)> = indegree
        .iter()
        .filter(|&(_, deg)| *deg == 0)
        .map(|(&idx, _)| (node_id(graph, idx), idx))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some((id, idx)) = frontier.pop_first() {
        for next in graph.neighbors_directed(idx, Direction::Outgoing) {
            if let Some(deg) = indegree.get_mut(&next) {
                *deg -= 1;
                if *deg == 0 {
                    frontier.insert((node_id(graph, next), next));
                }
            }
        }
        indegree.remove(&idx);
        order.push(id);
    }

    if indegree.is_empty() {
        return Ok(order);
    }

    let cycles = find_all_cycles(graph);
    if let Some(path) = cycles
        .first()
        .and_then(|members| members.first())
        .and_then(|first| graph.node_indices().find(|&idx| graph[idx] == *first))
        .and_then(|idx| cycle_path_through(graph, idx))
    {
        warn!(
            unvisited = indegree.len(),
            path = %path.join(" -> "),
            "blocking edges contain a cycle"
        );
    }
    Err(SequenceError::Cycle { cycles })
}

fn compute_content_hash<'a>(
    ids: impl Iterator<Item = &'a String>,
    edges: &BTreeSet<&BlockingEdge>,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"items\x00");
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\x00");
    }
    hasher.update(b"edges\x00");
    for edge in edges {
        hasher.update(edge.blocker.as_bytes());
        hasher.update(b"\x00");
        hasher.update(edge.blocked.as_bytes());
        hasher.update(b"\x00");
    }
    format!("blake3:{}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(blocker: &str, blocked: &str) -> BlockingEdge {
        BlockingEdge::new(blocker, blocked)
    }

    #[test]
    fn empty_store_loads() {
        let store = GraphStore::load(Vec::<String>::new(), &[]).expect("load");
        assert!(store.is_empty());
        assert_eq!(store.edge_count(), 0);
        assert!(store.topological_order().is_empty());
    }

    #[test]
    fn blockers_and_dependents_are_inverse() {
        let store = GraphStore::load(["a", "b", "c"], &[edge("a", "c"), edge("b", "c")])
            .expect("load");

        assert_eq!(store.blockers_of("c"), BTreeSet::from(["a", "b"]));
        assert_eq!(store.dependents_of("a"), BTreeSet::from(["c"]));
        assert!(store.blockers_of("a").is_empty());
        assert!(store.dependents_of("c").is_empty());
    }

    #[test]
    fn unknown_id_queries_return_empty() {
        let store = GraphStore::load(["a"], &[]).expect("load");
        assert!(store.blockers_of("zzz").is_empty());
        assert!(store.dependents_of("zzz").is_empty());
        assert!(store.item("zzz").is_none());
    }

    #[test]
    fn duplicate_edges_collapse() {
        let store =
            GraphStore::load(["a", "b"], &[edge("a", "b"), edge("a", "b")]).expect("load");
        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.edges(), vec![edge("a", "b")]);
    }

    #[test]
    fn duplicate_item_is_rejected() {
        let err = GraphStore::load(["a", "a"], &[]).expect_err("duplicate");
        assert_eq!(err, SequenceError::DuplicateItem("a".to_string()));
    }

    #[test]
    fn edge_to_unknown_item_is_rejected() {
        let err = GraphStore::load(["a"], &[edge("a", "ghost")]).expect_err("unknown");
        assert_eq!(
            err,
            SequenceError::UnknownReference {
                blocker: "a".to_string(),
                blocked: "ghost".to_string(),
                missing: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn three_item_cycle_is_rejected() {
        let err = GraphStore::load(
            ["a", "b", "c"],
            &[edge("a", "b"), edge("b", "c"), edge("c", "a")],
        )
        .expect_err("cycle");
        assert_eq!(
            err,
            SequenceError::Cycle {
                cycles: vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]],
            }
        );
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let err = GraphStore::load(["a"], &[edge("a", "a")]).expect_err("self loop");
        assert!(matches!(err, SequenceError::Cycle { ref cycles } if cycles == &vec![vec!["a".to_string()]]));
    }

    #[test]
    fn topological_order_breaks_ties_by_id() {
        let store = GraphStore::load(
            ["d", "c", "b", "a"],
            &[edge("c", "a"), edge("d", "b")],
        )
        .expect("load");
        assert_eq!(store.topological_order(), ["c", "a", "d", "b"]);
    }

    #[test]
    fn items_iterate_in_id_order() {
        let store = GraphStore::load(["b", "c", "a"], &[]).expect("load");
        let ids: Vec<&str> = store.ids().collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn content_hash_ignores_input_order() {
        let one = GraphStore::load(["a", "b", "c"], &[edge("a", "b"), edge("b", "c")])
            .expect("load");
        let two = GraphStore::load(["c", "b", "a"], &[edge("b", "c"), edge("a", "b")])
            .expect("load");
        assert_eq!(one.content_hash(), two.content_hash());
        assert!(one.content_hash().starts_with("blake3:"));

        let three = GraphStore::load(["a", "b", "c"], &[edge("a", "b")]).expect("load");
        assert_ne!(one.content_hash(), three.content_hash());
    }
}
