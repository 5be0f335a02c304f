//! Blocking dependency graph over work items.
//!
//! ## Submodules
//!
//! - [`store`]: [`GraphStore`], the owned item + edge collections and the
//!   structural queries (`blockers_of`, `dependents_of`, topological order).
//! - [`cycles`]: SCC-based cycle reporting used when a plan is rejected.
//! - [`layers`]: topological layers for parallel execution planning.

pub mod cycles;
pub mod layers;
pub mod store;

pub use layers::{LayerEntry, explain_layers, topological_layers};
pub use store::GraphStore;
