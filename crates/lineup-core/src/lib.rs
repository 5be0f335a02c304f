//! lineup-core library: dependency-ordered sequencing of work items.
//!
//! # Conventions
//!
//! - **Errors**: Sequencing operations return [`error::SequenceError`]; file
//!   and config I/O returns `anyhow::Result` with context.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod model;
pub mod plan;
pub mod sequencer;

pub use driver::{Driver, Executor, FailedItem, Outcome, RunReport, RunStatus};
pub use error::{ErrorCode, SequenceError};
pub use graph::GraphStore;
pub use model::{BlockingEdge, State, WorkItem};
pub use plan::{Plan, PlanItem, load_plan};
pub use sequencer::{RunSnapshot, Sequencer, SharedSequencer};
