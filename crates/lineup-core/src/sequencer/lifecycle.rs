//! Lifecycle transitions: the only code that mutates item state.
//!
//! ```text
//! Pending ──start──▶ InProgress ──complete──▶ Done
//!                        │
//!                      fail
//!                        ▼
//!   InProgress ◀─start── Blocked ──guard exhausted──▶ Failed
//! ```

use tracing::debug;

use crate::error::SequenceError;
use crate::graph::store::GraphStore;
use crate::model::item::{State, WorkItem};

use super::guard::RetryGuard;
use super::readiness;

/// Begin an attempt on `id`.
///
/// Accepts a `Pending` item whose blockers are all `Done`, or a `Blocked`
/// item (retry). Increments `attempts`.
///
/// # Errors
///
/// - [`SequenceError::UnknownItem`] if `id` is not in the store.
/// - [`SequenceError::NotReady`] for any other state, or unmet blockers.
pub fn start<'s>(store: &'s mut GraphStore, id: &str) -> Result<&'s WorkItem, SequenceError> {
    let state = current_state(store, id)?;
    match state {
        State::Pending => {
            if !readiness::blockers_done(store, id) {
                let waiting: Vec<String> = readiness::unmet_blockers(store, id)
                    .into_iter()
                    .map(|b| format!("{} [{}]", b.id, b.state))
                    .collect();
                return Err(SequenceError::NotReady {
                    id: id.to_string(),
                    reason: format!("waiting on {}", waiting.join(", ")),
                });
            }
        }
        State::Blocked => {}
        other => {
            return Err(SequenceError::NotReady {
                id: id.to_string(),
                reason: format!("item is {other}"),
            });
        }
    }

    let item = item_mut(store, id)?;
    item.transition(State::InProgress)?;
    item.attempts += 1;
    debug!(id, attempts = item.attempts, retry = state == State::Blocked, "item started");
    Ok(item)
}

/// Mark an `InProgress` item `Done`.
///
/// # Errors
///
/// [`SequenceError::UnknownItem`] or [`SequenceError::InvalidTransition`].
pub fn complete<'s>(store: &'s mut GraphStore, id: &str) -> Result<&'s WorkItem, SequenceError> {
    let item = item_mut(store, id)?;
    item.transition(State::Done)?;
    debug!(id, attempts = item.attempts, "item done");
    Ok(item)
}

/// Record a failed attempt on an `InProgress` item.
///
/// The item moves to `Blocked` carrying `reason`; the guard then decides
/// whether it stays there (retry) or becomes `Failed`.
///
/// # Errors
///
/// [`SequenceError::UnknownItem`] or [`SequenceError::InvalidTransition`].
pub fn fail<'s>(
    store: &'s mut GraphStore,
    guard: &RetryGuard,
    id: &str,
    reason: impl Into<String>,
) -> Result<&'s WorkItem, SequenceError> {
    let item = item_mut(store, id)?;
    if item.state != State::InProgress {
        return Err(SequenceError::InvalidTransition {
            id: id.to_string(),
            from: item.state,
            to: State::Blocked,
        });
    }
    item.transition(State::Blocked)?;
    item.last_error = Some(reason.into());
    guard.on_failure(item)?;
    Ok(item)
}

fn current_state(store: &GraphStore, id: &str) -> Result<State, SequenceError> {
    store
        .item(id)
        .map(|item| item.state)
        .ok_or_else(|| SequenceError::UnknownItem(id.to_string()))
}

fn item_mut<'s>(store: &'s mut GraphStore, id: &str) -> Result<&'s mut WorkItem, SequenceError> {
    store
        .item_mut(id)
        .ok_or_else(|| SequenceError::UnknownItem(id.to_string()))
}
