//! Execution layers for parallel work planning.
//!
//! Layer `k` holds every item whose longest chain of blockers has length
//! `k`. Everything in one layer can run side by side once all earlier layers
//! are `Done`.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::store::GraphStore;

/// One item in a layer together with the blockers that put it there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerEntry {
    pub id: String,
    pub blocked_by: Vec<String>,
}

/// Compute topological layers for the whole store.
///
/// Each returned layer is sorted by id. An empty store yields no layers.
#[must_use]
pub fn topological_layers(store: &GraphStore) -> Vec<Vec<String>> {
    explain_layers(store)
        .into_iter()
        .map(|layer| layer.into_iter().map(|entry| entry.id).collect())
        .collect()
}

/// Same as [`topological_layers`], but keeps each item's direct blockers.
#[must_use]
pub fn explain_layers(store: &GraphStore) -> Vec<Vec<LayerEntry>> {
    let mut depth: HashMap<&str, usize> = HashMap::with_capacity(store.len());
    let mut layers: BTreeMap<usize, Vec<LayerEntry>> = BTreeMap::new();

    // The store's order is topological, so every blocker's depth is known
    // before its dependents are visited.
    for id in store.topological_order() {
        let blockers = store.blockers_of(id);
        let level = blockers
            .iter()
            .filter_map(|blocker| depth.get(blocker))
            .map(|d| d + 1)
            .max()
            .unwrap_or(0);
        depth.insert(id.as_str(), level);
        layers.entry(level).or_default().push(LayerEntry {
            id: id.clone(),
            blocked_by: blockers.into_iter().map(str::to_string).collect(),
        });
    }

    layers
        .into_values()
        .map(|mut layer| {
            layer.sort_by(|a, b| a.id.cmp(&b.id));
            layer
        })
        .collect()
}
