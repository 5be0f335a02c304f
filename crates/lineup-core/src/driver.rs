//! The cooperative driver loop and the executor seam.
//!
//! The driver repeatedly asks the sequencer for its next batch, starts up to
//! `jobs` items, hands each to an [`Executor`] on a scoped thread and reports
//! the outcome back through the [`SharedSequencer`] lock. The run ends when
//! every item is terminal, when `stop_on_failure` trips, or when the guard
//! reports a deadlock.
//!
//! Executors stand in for whatever does the real work (a shell command, a
//! sub-agent implementing a ticket, a CI job). They are plain
//! request/response calls: nothing in the core waits on them except the
//! driver's own thread join.

use std::thread;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SequenceError;
use crate::model::item::State;
use crate::plan::{Plan, PlanItem};
use crate::sequencer::{SharedSequencer, StuckItem};

/// Result of executing one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

/// Performs the external work behind one plan item.
pub trait Executor: Sync {
    fn execute(&self, item: &PlanItem) -> Outcome;
}

impl<F> Executor for F
where
    F: Fn(&PlanItem) -> Outcome + Sync,
{
    fn execute(&self, item: &PlanItem) -> Outcome {
        self(item)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every item is `Done`.
    Completed,
    /// Every item is terminal, at least one `Failed`.
    Failed,
    /// `stop_on_failure` ended the run early.
    Halted,
    /// Unterminated items remain that can never start.
    Deadlocked,
}

impl RunStatus {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A terminally failed item and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub id: String,
    pub attempts: u32,
    pub reason: Option<String>,
}

/// Summary of one driver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub plan_hash: String,
    pub done: Vec<String>,
    pub failed: Vec<FailedItem>,
    /// Items never reached because the run halted early.
    pub remaining: Vec<String>,
    /// Deadlock details; empty unless `status` is `Deadlocked`.
    pub stuck: Vec<StuckItem>,
    pub attempts: u32,
}

impl RunReport {
    fn collect(shared: &SharedSequencer, status: RunStatus, stuck: Vec<StuckItem>) -> Self {
        let snapshot = shared.snapshot();
        let mut report = Self {
            status,
            plan_hash: snapshot.plan_hash,
            done: Vec::new(),
            failed: Vec::new(),
            remaining: Vec::new(),
            stuck,
            attempts: 0,
        };
        for item in snapshot.items {
            report.attempts += item.attempts;
            match item.state {
                State::Done => report.done.push(item.id),
                State::Failed => report.failed.push(FailedItem {
                    id: item.id,
                    attempts: item.attempts,
                    reason: item.last_error,
                }),
                State::Pending | State::InProgress | State::Blocked => {
                    report.remaining.push(item.id);
                }
            }
        }
        report
    }
}

/// Runs a plan to completion through an [`Executor`].
#[derive(Debug, Clone, Copy)]
pub struct Driver {
    jobs: usize,
    stop_on_failure: bool,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            jobs: 1,
            stop_on_failure: false,
        }
    }
}

impl Driver {
    /// `jobs` is clamped to at least one.
    #[must_use]
    pub fn new(jobs: usize, stop_on_failure: bool) -> Self {
        Self {
            jobs: jobs.max(1),
            stop_on_failure,
        }
    }

    /// Drive `shared` until the run ends.
    ///
    /// # Errors
    ///
    /// Returns a [`SequenceError`] only for caller errors (for example an item
    /// in the sequencer that the plan does not describe). A deadlock is not an
    /// error here: it is reported as [`RunStatus::Deadlocked`].
    pub fn run<E: Executor>(
        &self,
        shared: &SharedSequencer,
        plan: &Plan,
        executor: &E,
    ) -> Result<RunReport, SequenceError> {
        let items = plan.by_id();
        info!(items = items.len(), jobs = self.jobs, "run started");

        loop {
            let batch = shared.next_batch();
            if batch.is_empty() {
                let report = match shared.check_deadlock() {
                    Ok(()) if shared.is_finished() => {
                        let status = if shared.counts().failed == 0 {
                            RunStatus::Completed
                        } else {
                            RunStatus::Failed
                        };
                        RunReport::collect(shared, status, Vec::new())
                    }
                    Ok(()) => {
                        // Nothing dispatchable and nothing in flight, yet not
                        // finished: check_deadlock would have reported it.
                        warn!("run stalled without a deadlock report");
                        RunReport::collect(shared, RunStatus::Deadlocked, Vec::new())
                    }
                    Err(SequenceError::Deadlock(deadlock)) => {
                        RunReport::collect(shared, RunStatus::Deadlocked, deadlock.items)
                    }
                    Err(other) => return Err(other),
                };
                info!(status = ?report.status, done = report.done.len(), failed = report.failed.len(), "run finished");
                return Ok(report);
            }

            // Look every item up before starting any, so a bad batch leaves
            // nothing InProgress.
            let picked = batch
                .iter()
                .take(self.jobs)
                .map(|id| {
                    items
                        .get(id.as_str())
                        .copied()
                        .ok_or_else(|| SequenceError::UnknownItem(id.clone()))
                })
                .collect::<Result<Vec<&PlanItem>, _>>()?;

            let mut dispatch: Vec<&PlanItem> = Vec::with_capacity(picked.len());
            let mut start_error = None;
            for item in picked {
                match shared.start(&item.id) {
                    Ok(_) => dispatch.push(item),
                    Err(e) => {
                        start_error = Some(e);
                        break;
                    }
                }
            }
            debug!(count = dispatch.len(), "dispatching batch");

            // Items already started still run and settle before the error surfaces.
            let failed_now = dispatch_batch(shared, &dispatch, executor)?;
            if let Some(e) = start_error {
                return Err(e);
            }

            if self.stop_on_failure && failed_now {
                warn!("stopping after terminal failure");
                let report = RunReport::collect(shared, RunStatus::Halted, Vec::new());
                return Ok(report);
            }
        }
    }
}

/// Execute started items concurrently; returns `true` if any item ended `Failed`.
fn dispatch_batch<E: Executor>(
    shared: &SharedSequencer,
    dispatch: &[&PlanItem],
    executor: &E,
) -> Result<bool, SequenceError> {
    thread::scope(|scope| -> Result<bool, SequenceError> {
        let handles: Vec<_> = dispatch
            .iter()
            .map(|item| {
                let worker = shared.clone();
                debug!(id = %item.id, label = item.label(), "item dispatched");
                let handle = scope.spawn(move || report_outcome(&worker, item, executor.execute(item)));
                (item.id.as_str(), handle)
            })
            .collect();

        let mut failed_now = false;
        for (id, handle) in handles {
            let settled = match handle.join() {
                Ok(result) => result?,
                // The worker never reported back; record the panic as a failure.
                Err(_) => shared.fail(id, "executor panicked")?,
            };
            failed_now |= settled == State::Failed;
        }
        Ok(failed_now)
    })
}

fn report_outcome(
    shared: &SharedSequencer,
    item: &PlanItem,
    outcome: Outcome,
) -> Result<State, SequenceError> {
    match outcome {
        Outcome::Success => shared.complete(&item.id).map(|done| done.state),
        Outcome::Failure(reason) => shared.fail(&item.id, reason),
    }
}
