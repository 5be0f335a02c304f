//! Run snapshots: caller-side persistence of per-item lifecycle state.
//!
//! The core holds nothing across runs. A caller that wants to resume saves a
//! [`RunSnapshot`] and applies it to a freshly loaded sequencer with
//! [`Sequencer::restore`]. Snapshots are bound to the plan's content hash.
//! They may not contain `InProgress` items: work that was in flight when the
//! previous run stopped has to be reconciled by the caller first.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SequenceError;
use crate::model::item::{State, WorkItem};

use super::{Sequencer, readiness};

/// Serialized lifecycle state of every item in one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub plan_hash: String,
    pub max_attempts: u32,
    pub items: Vec<WorkItem>,
}

impl RunSnapshot {
    /// Put every `Failed` item back to a fresh `Pending` record.
    ///
    /// Returns the ids that were reset, sorted.
    pub fn reset_failed(&mut self) -> Vec<String> {
        let mut reset = Vec::new();
        for item in &mut self.items {
            if item.state == State::Failed {
                *item = WorkItem::new(item.id.clone());
                reset.push(item.id.clone());
            }
        }
        reset.sort_unstable();
        reset
    }
}

impl Sequencer {
    /// Capture the current state of every item, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            plan_hash: self.store.content_hash().to_string(),
            max_attempts: self.guard.max_attempts(),
            items: self.store.items().cloned().collect(),
        }
    }

    /// Apply a saved snapshot on top of a freshly loaded sequencer.
    ///
    /// Items missing from the snapshot keep their current state. The snapshot
    /// is validated in full before anything is applied. Attempts are checked
    /// against this sequencer's `max_attempts`, not the one saved: a `Blocked`
    /// item that has used up its attempts is settled to `Failed`.
    ///
    /// # Errors
    ///
    /// [`SequenceError::SnapshotMismatch`] if the plan hash differs, an id is
    /// unknown or repeated, an item is `InProgress`, an item has more attempts
    /// than `max_attempts` allows, `last_error` disagrees with the state, or a
    /// started item has blockers that are not `Done`.
    pub fn restore(&mut self, snapshot: &RunSnapshot) -> Result<(), SequenceError> {
        if snapshot.plan_hash != self.store.content_hash() {
            return Err(SequenceError::SnapshotMismatch(format!(
                "plan hash {} does not match {}",
                snapshot.plan_hash,
                self.store.content_hash()
            )));
        }

        let max_attempts = self.guard.max_attempts();
        let mut seen: HashSet<&str> = HashSet::with_capacity(snapshot.items.len());
        for saved in &snapshot.items {
            if !self.store.contains(&saved.id) {
                return Err(mismatch(&saved.id, "unknown item"));
            }
            if !seen.insert(saved.id.as_str()) {
                return Err(mismatch(&saved.id, "listed twice"));
            }
            if saved.state == State::InProgress {
                return Err(mismatch(
                    &saved.id,
                    "was in progress when saved; reconcile it before resuming",
                ));
            }
            if saved.attempts > max_attempts {
                return Err(mismatch(
                    &saved.id,
                    &format!(
                        "has {} attempts but max_attempts is {max_attempts}",
                        saved.attempts
                    ),
                ));
            }
            if !saved.error_matches_state() {
                return Err(mismatch(&saved.id, "last_error set outside blocked/failed"));
            }
        }

        let mut restored = self.store.clone();
        for saved in &snapshot.items {
            if let Some(item) = restored.item_mut(&saved.id) {
                item.clone_from(saved);
                if item.state == State::Blocked && item.attempts >= max_attempts {
                    item.transition(State::Failed)?;
                    info!(
                        id = %item.id,
                        attempts = item.attempts,
                        "restored item has no attempts left"
                    );
                }
            }
        }

        // Anything that got past Pending must have had its blockers finished.
        for item in restored.items() {
            if item.state != State::Pending && !readiness::blockers_done(&restored, &item.id) {
                return Err(mismatch(&item.id, "started before its blockers were done"));
            }
        }

        self.store = restored;
        info!(
            items = snapshot.items.len(),
            hash = %snapshot.plan_hash,
            "snapshot restored"
        );
        Ok(())
    }
}

fn mismatch(id: &str, reason: &str) -> SequenceError {
    SequenceError::SnapshotMismatch(format!("item '{id}' {reason}"))
}

/// Write a snapshot as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_snapshot(path: &Path, snapshot: &RunSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Read a snapshot written by [`save_snapshot`].
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_snapshot(path: &Path) -> Result<Option<RunSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(snapshot))
}
