//! The work-item sequencer.
//!
//! A [`Sequencer`] owns one [`GraphStore`] and one [`RetryGuard`] for the
//! duration of a run. Callers drive it cooperatively:
//!
//! ```rust,ignore
//! let mut seq = Sequencer::load(ids, &edges, &SequencerConfig::default())?;
//! loop {
//!     let batch: Vec<String> = seq.next_batch().into_iter().map(str::to_string).collect();
//!     if batch.is_empty() {
//!         seq.check_deadlock()?;
//!         break;
//!     }
//!     for id in batch {
//!         seq.start(&id)?;
//!         match execute(&id) {
//!             Ok(()) => { seq.complete(&id)?; }
//!             Err(reason) => { seq.fail(&id, reason)?; }
//!         }
//!     }
//! }
//! ```
//!
//! For concurrent dispatch wrap it in a [`SharedSequencer`], which serializes
//! every transition behind one lock.

pub mod guard;
pub mod lifecycle;
pub mod readiness;
pub mod shared;
pub mod snapshot;

use serde::Serialize;
use tracing::info;

use crate::config::SequencerConfig;
use crate::error::SequenceError;
use crate::graph::store::GraphStore;
use crate::model::item::{BlockingEdge, State, WorkItem};

pub use guard::{DeadlockReport, RetryGuard, StuckItem, UnmetBlocker};
pub use shared::SharedSequencer;
pub use snapshot::RunSnapshot;

/// Number of items in each lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub blocked: usize,
    pub failed: usize,
}

impl StateCounts {
    /// Count the states of `items`.
    #[must_use]
    pub fn tally<'a>(items: impl IntoIterator<Item = &'a WorkItem>) -> Self {
        let mut counts = Self::default();
        for item in items {
            match item.state {
                State::Pending => counts.pending += 1,
                State::InProgress => counts.in_progress += 1,
                State::Done => counts.done += 1,
                State::Blocked => counts.blocked += 1,
                State::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Items that are neither `Done` nor `Failed`.
    #[must_use]
    pub const fn unterminated(&self) -> usize {
        self.pending + self.in_progress + self.blocked
    }
}

/// Graph store plus retry guard: the full sequencing state of one run.
#[derive(Debug, Clone)]
pub struct Sequencer {
    store: GraphStore,
    guard: RetryGuard,
}

impl Sequencer {
    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidConfig`] for a zero `max_attempts`.
    pub fn new(store: GraphStore, config: &SequencerConfig) -> Result<Self, SequenceError> {
        let guard = RetryGuard::new(config.max_attempts)?;
        info!(
            items = store.len(),
            edges = store.edge_count(),
            max_attempts = guard.max_attempts(),
            "sequencer ready"
        );
        Ok(Self { store, guard })
    }

    /// Load items and edges and build a sequencer in one step.
    ///
    /// # Errors
    ///
    /// Any error from [`GraphStore::load`] or [`Sequencer::new`].
    pub fn load<I, S>(
        items: I,
        edges: &[BlockingEdge],
        config: &SequencerConfig,
    ) -> Result<Self, SequenceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = GraphStore::load(items, edges)?;
        Self::new(store, config)
    }

    #[must_use]
    pub const fn store(&self) -> &GraphStore {
        &self.store
    }

    #[must_use]
    pub const fn guard(&self) -> &RetryGuard {
        &self.guard
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&WorkItem> {
        self.store.item(id)
    }

    /// `Pending` items whose blockers are all `Done`, sorted by id.
    #[must_use]
    pub fn ready_items(&self) -> Vec<&str> {
        readiness::ready_items(&self.store)
    }

    /// `Blocked` items awaiting a retry, sorted by id.
    #[must_use]
    pub fn retryable_items(&self) -> Vec<&str> {
        readiness::retryable_items(&self.store)
    }

    /// Ready and retryable items together, sorted by id.
    #[must_use]
    pub fn next_batch(&self) -> Vec<&str> {
        readiness::next_batch(&self.store)
    }

    /// See [`lifecycle::start`].
    ///
    /// # Errors
    ///
    /// `UnknownItem` or `NotReady`.
    pub fn start(&mut self, id: &str) -> Result<&WorkItem, SequenceError> {
        lifecycle::start(&mut self.store, id)
    }

    /// See [`lifecycle::complete`].
    ///
    /// # Errors
    ///
    /// `UnknownItem` or `InvalidTransition`.
    pub fn complete(&mut self, id: &str) -> Result<&WorkItem, SequenceError> {
        lifecycle::complete(&mut self.store, id)
    }

    /// See [`lifecycle::fail`].
    ///
    /// # Errors
    ///
    /// `UnknownItem` or `InvalidTransition`.
    pub fn fail(&mut self, id: &str, reason: impl Into<String>) -> Result<&WorkItem, SequenceError> {
        lifecycle::fail(&mut self.store, &self.guard, id, reason)
    }

    /// See [`RetryGuard::check_deadlock`].
    ///
    /// # Errors
    ///
    /// `Deadlock` with every stuck item and its unmet blockers.
    pub fn check_deadlock(&self) -> Result<(), SequenceError> {
        self.guard.check_deadlock(&self.store)
    }

    #[must_use]
    pub fn counts(&self) -> StateCounts {
        StateCounts::tally(self.store.items())
    }

    /// Returns `true` once every item is `Done` or `Failed`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.store.items().all(|item| item.state.is_terminal())
    }

    /// Returns `true` once every item is `Done`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.store.items().all(|item| item.state == State::Done)
    }
}
