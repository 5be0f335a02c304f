//! Work-item data model: lifecycle states, items and blocking edges.

pub mod item;

pub use item::{BlockingEdge, State, WorkItem};
