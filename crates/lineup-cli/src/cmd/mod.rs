pub mod check;
pub mod completions;
pub mod plan;
pub mod ready;
pub mod run;
pub mod status;

use std::path::Path;

use lineup_core::config::{Overrides, ProjectConfig, SequencerConfig, resolve_config};
use lineup_core::error::ErrorCode;
use lineup_core::sequencer::snapshot::load_snapshot;
use lineup_core::{Plan, RunSnapshot, SequenceError, Sequencer, load_plan};

use crate::output::{CliError, OutputMode, render_error};

/// Read a plan file, rendering parse failures before returning them.
pub fn read_plan(path: &Path, output: OutputMode) -> anyhow::Result<Plan> {
    match load_plan(path) {
        Ok(plan) => Ok(plan),
        Err(e) => {
            let code = ErrorCode::PlanParseError;
            render_error(
                output,
                &CliError::with_details(
                    format!("{e:#}"),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            Err(e)
        }
    }
}

/// Resolve the run configuration, rendering failures with their code.
///
/// Validation problems carry [`ErrorCode::InvalidConfig`]; anything else
/// means the project config file could not be read or parsed.
pub fn load_config(
    project_root: &Path,
    overrides: Overrides,
    output: OutputMode,
) -> anyhow::Result<ProjectConfig> {
    match resolve_config(project_root, overrides) {
        Ok(config) => Ok(config),
        Err(e) => {
            let rendered = match e.downcast_ref::<SequenceError>() {
                Some(err) => CliError::from(err),
                None => {
                    let code = ErrorCode::ConfigParseError;
                    CliError::with_details(
                        format!("{e:#}"),
                        code.hint().unwrap_or_default(),
                        code.code(),
                    )
                }
            };
            render_error(output, &rendered)?;
            Err(e)
        }
    }
}

/// Read a plan and build its sequencer; structural errors are rendered with
/// their code and hint.
pub fn open_plan(
    path: &Path,
    config: &SequencerConfig,
    output: OutputMode,
) -> anyhow::Result<(Plan, Sequencer)> {
    let plan = read_plan(path, output)?;
    let sequencer = plan
        .to_sequencer(config)
        .or_else(|e| fail_with(output, e))?;
    Ok((plan, sequencer))
}

/// Load a saved snapshot, if `state_file` is given and exists.
pub fn read_state(state_file: Option<&Path>) -> anyhow::Result<Option<RunSnapshot>> {
    match state_file {
        Some(path) => load_snapshot(path),
        None => Ok(None),
    }
}

/// Apply a snapshot to `sequencer`, rendering a mismatch before returning it.
pub fn apply_state(
    sequencer: &mut Sequencer,
    snapshot: &RunSnapshot,
    output: OutputMode,
) -> anyhow::Result<()> {
    sequencer
        .restore(snapshot)
        .or_else(|e| fail_with(output, e))
}

/// Render a sequencing error and turn it into an `anyhow` error.
pub fn fail_with<T>(output: OutputMode, err: SequenceError) -> anyhow::Result<T> {
    render_error(output, &CliError::from(&err))?;
    Err(err.into())
}
