//! Retry bounding and deadlock detection.
//!
//! The guard decides what a failed attempt turns into (`Blocked` while
//! attempts remain, `Failed` once they are spent) and recognises the point
//! where nothing left in the graph can ever start.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SequenceError;
use crate::graph::store::GraphStore;
use crate::model::item::{State, WorkItem};

use super::readiness;

/// Default number of attempts an item gets before it is marked `Failed`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A blocker that is not yet `Done`, with the state it is stuck in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetBlocker {
    pub id: String,
    pub state: State,
}

/// An unterminated item that can no longer make progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckItem {
    pub id: String,
    pub state: State,
    pub unmet_blockers: Vec<UnmetBlocker>,
}

/// Every stuck item at the moment a deadlock was detected, sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeadlockReport {
    pub items: Vec<StuckItem>,
}

impl fmt::Display for DeadlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deadlock: {} item(s) can never start", self.items.len())?;
        for (i, item) in self.items.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            let waiting: Vec<String> = item
                .unmet_blockers
                .iter()
                .map(|b| format!("{} [{}]", b.id, b.state))
                .collect();
            write!(f, "{sep}{} (waiting on {})", item.id, waiting.join(", "))?;
        }
        Ok(())
    }
}

/// Bounds per-item retries and reports global deadlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryGuard {
    max_attempts: u32,
}

impl Default for RetryGuard {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryGuard {
    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidConfig`] when `max_attempts` is zero.
    pub fn new(max_attempts: u32) -> Result<Self, SequenceError> {
        if max_attempts == 0 {
            return Err(SequenceError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self { max_attempts })
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Settle a `Blocked` item after a failed attempt.
    ///
    /// Leaves the item `Blocked` (eligible to retry) while
    /// `attempts < max_attempts`, otherwise moves it to `Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidTransition`] if the item is not `Blocked`.
    pub fn on_failure(&self, item: &mut WorkItem) -> Result<State, SequenceError> {
        if item.state != State::Blocked {
            return Err(SequenceError::InvalidTransition {
                id: item.id.clone(),
                from: item.state,
                to: State::Blocked,
            });
        }

        if item.attempts < self.max_attempts {
            warn!(
                id = %item.id,
                attempts = item.attempts,
                max_attempts = self.max_attempts,
                reason = item.last_error.as_deref().unwrap_or_default(),
                "attempt failed, item will be retried"
            );
            return Ok(State::Blocked);
        }

        item.transition(State::Failed)?;
        warn!(
            id = %item.id,
            attempts = item.attempts,
            reason = item.last_error.as_deref().unwrap_or_default(),
            "retries exhausted, item failed"
        );
        Ok(State::Failed)
    }

    /// Report a deadlock when no work can be dispatched yet unterminated
    /// items remain.
    ///
    /// Returns `Ok(())` when something is ready or retryable, when an item is
    /// still `InProgress` (its outcome may unblock others), or when every item
    /// is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Deadlock`] listing each stuck item and its
    /// blockers that are not `Done`.
    pub fn check_deadlock(&self, store: &GraphStore) -> Result<(), SequenceError> {
        if !readiness::next_batch(store).is_empty()
            || store.items().any(|item| item.state == State::InProgress)
        {
            return Ok(());
        }

        let items: Vec<StuckItem> = store
            .items()
            .filter(|item| !item.state.is_terminal())
            .map(|item| StuckItem {
                id: item.id.clone(),
                state: item.state,
                unmet_blockers: readiness::unmet_blockers(store, &item.id),
            })
            .collect();

        if items.is_empty() {
            return Ok(());
        }

        let report = DeadlockReport { items };
        warn!(stuck = report.items.len(), "{report}");
        Err(SequenceError::Deadlock(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked_item(attempts: u32) -> WorkItem {
        WorkItem {
            id: "a".to_string(),
            state: State::Blocked,
            attempts,
            last_error: Some("x".to_string()),
        }
    }

    #[test]
    fn zero_attempts_is_invalid() {
        assert!(matches!(
            RetryGuard::new(0),
            Err(SequenceError::InvalidConfig(_))
        ));
        assert_eq!(RetryGuard::default().max_attempts(), 3);
    }

    #[test]
    fn failure_below_limit_stays_blocked() {
        let guard = RetryGuard::new(3).expect("guard");
        let mut item = blocked_item(2);
        assert_eq!(guard.on_failure(&mut item), Ok(State::Blocked));
        assert_eq!(item.state, State::Blocked);
        assert_eq!(item.last_error.as_deref(), Some("x"));
    }

    #[test]
    fn failure_at_limit_becomes_failed() {
        let guard = RetryGuard::new(3).expect("guard");
        let mut item = blocked_item(3);
        assert_eq!(guard.on_failure(&mut item), Ok(State::Failed));
        assert_eq!(item.state, State::Failed);
        assert_eq!(item.last_error.as_deref(), Some("x"));
    }

    #[test]
    fn on_failure_requires_blocked_item() {
        let guard = RetryGuard::default();
        let mut item = WorkItem::new("a");
        assert!(matches!(
            guard.on_failure(&mut item),
            Err(SequenceError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn deadlock_report_display_names_blockers() {
        let report = DeadlockReport {
            items: vec![StuckItem {
                id: "b".to_string(),
                state: State::Pending,
                unmet_blockers: vec![UnmetBlocker {
                    id: "a".to_string(),
                    state: State::Failed,
                }],
            }],
        };
        assert_eq!(
            report.to_string(),
            "deadlock: 1 item(s) can never start: b (waiting on a [failed])"
        );
    }

    #[test]
    fn fresh_graph_is_not_deadlocked() {
        let store = GraphStore::load(["a"], &[]).expect("load");
        assert_eq!(RetryGuard::default().check_deadlock(&store), Ok(()));
    }
}
