//! Readiness queries over a [`GraphStore`].
//!
//! An item is **ready** when it is `Pending` and every blocker is `Done`.
//! `Blocked` items (failed, retry allowed) are reported separately as
//! **retryable**; their blockers were already `Done` when they first started.
//! All results are sorted by ascending id.

use crate::graph::store::GraphStore;
use crate::model::item::State;

use super::guard::UnmetBlocker;

/// Return `true` if every blocker of `id` is `Done`.
#[must_use]
pub fn blockers_done(store: &GraphStore, id: &str) -> bool {
    store
        .blockers_of(id)
        .into_iter()
        .all(|blocker| store.item(blocker).is_some_and(|b| b.state == State::Done))
}

/// Return `true` if `id` is `Pending` with all blockers `Done`.
#[must_use]
pub fn is_ready(store: &GraphStore, id: &str) -> bool {
    store
        .item(id)
        .is_some_and(|item| item.state == State::Pending && blockers_done(store, id))
}

/// Every `Pending` item whose blockers are all `Done`.
#[must_use]
pub fn ready_items(store: &GraphStore) -> Vec<&str> {
    store
        .items()
        .filter(|item| is_ready(store, &item.id))
        .map(|item| item.id.as_str())
        .collect()
}

/// Every `Blocked` item, i.e. failed attempts still eligible for retry.
#[must_use]
pub fn retryable_items(store: &GraphStore) -> Vec<&str> {
    store
        .items()
        .filter(|item| item.state == State::Blocked)
        .map(|item| item.id.as_str())
        .collect()
}

/// Ready plus retryable items, sorted by id: the driver's work queue.
#[must_use]
pub fn next_batch(store: &GraphStore) -> Vec<&str> {
    let mut batch = ready_items(store);
    batch.extend(retryable_items(store));
    batch.sort_unstable();
    batch
}

/// Blockers of `id` that are not yet `Done`, sorted by id.
#[must_use]
pub fn unmet_blockers(store: &GraphStore, id: &str) -> Vec<UnmetBlocker> {
    store
        .blockers_of(id)
        .into_iter()
        .filter_map(|blocker| store.item(blocker))
        .filter(|blocker| blocker.state != State::Done)
        .map(|blocker| UnmetBlocker {
            id: blocker.id.clone(),
            state: blocker.state,
        })
        .collect()
}
