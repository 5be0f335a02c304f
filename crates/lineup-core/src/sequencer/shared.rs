//! Mutex-guarded handle for dispatching items from several threads.
//!
//! Readiness checks and the transitions that depend on them are
//! read-then-write; every call here takes the single lock for its whole
//! duration so two workers can never both start the same item.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::SequenceError;
use crate::model::item::{State, WorkItem};

use super::snapshot::RunSnapshot;
use super::{Sequencer, StateCounts};

/// Cloneable, thread-safe wrapper around a [`Sequencer`].
///
/// Queries return owned data so no lock outlives the call.
#[derive(Debug, Clone)]
pub struct SharedSequencer {
    inner: Arc<Mutex<Sequencer>>,
}

impl SharedSequencer {
    #[must_use]
    pub fn new(sequencer: Sequencer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sequencer)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sequencer> {
        // A panic while holding the lock cannot leave a half-applied
        // transition: every transition validates before it writes.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn ready_items(&self) -> Vec<String> {
        owned(self.lock().ready_items())
    }

    #[must_use]
    pub fn next_batch(&self) -> Vec<String> {
        owned(self.lock().next_batch())
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<WorkItem> {
        self.lock().item(id).cloned()
    }

    /// # Errors
    ///
    /// See [`Sequencer::start`].
    pub fn start(&self, id: &str) -> Result<WorkItem, SequenceError> {
        self.lock().start(id).cloned()
    }

    /// # Errors
    ///
    /// See [`Sequencer::complete`].
    pub fn complete(&self, id: &str) -> Result<WorkItem, SequenceError> {
        self.lock().complete(id).cloned()
    }

    /// Returns the state the item settled in (`Blocked` or `Failed`).
    ///
    /// # Errors
    ///
    /// See [`Sequencer::fail`].
    pub fn fail(&self, id: &str, reason: impl Into<String>) -> Result<State, SequenceError> {
        self.lock().fail(id, reason).map(|item| item.state)
    }

    /// # Errors
    ///
    /// See [`Sequencer::check_deadlock`].
    pub fn check_deadlock(&self) -> Result<(), SequenceError> {
        self.lock().check_deadlock()
    }

    #[must_use]
    pub fn counts(&self) -> StateCounts {
        self.lock().counts()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.lock().snapshot()
    }

    /// Recover the sequencer, cloning it if other handles are still alive.
    #[must_use]
    pub fn into_inner(self) -> Sequencer {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => {
                let guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                guard.clone()
            }
        }
    }
}

fn owned(ids: Vec<&str>) -> Vec<String> {
    ids.into_iter().map(str::to_string).collect()
}
