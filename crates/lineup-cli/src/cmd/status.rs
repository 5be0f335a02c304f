//! `lu status`: render a saved run snapshot.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use lineup_core::sequencer::StateCounts;
use lineup_core::WorkItem;
use serde::Serialize;

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};

/// Arguments for `lu status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Snapshot file written by `lu run --state-file`.
    #[arg(long, value_name = "FILE")]
    pub state_file: PathBuf,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    plan_hash: String,
    max_attempts: u32,
    counts: StateCounts,
    items: Vec<WorkItem>,
}

/// Execute `lu status`.
pub fn run_status(args: &StatusArgs, output: OutputMode) -> anyhow::Result<()> {
    let Some(snapshot) = super::read_state(Some(&args.state_file))? else {
        let msg = format!("state file not found: {}", args.state_file.display());
        render_error(
            output,
            &CliError::with_details(&msg, "run `lu run <plan> --state-file <FILE>` first", "E3001"),
        )?;
        anyhow::bail!("{msg}");
    };

    let payload = StatusOutput {
        counts: StateCounts::tally(&snapshot.items),
        plan_hash: snapshot.plan_hash,
        max_attempts: snapshot.max_attempts,
        items: snapshot.items,
    };

    render_mode(output, &payload, render_status_text, render_status_pretty)
}

fn render_status_text(payload: &StatusOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for item in &payload.items {
        write!(w, "{}  {}  attempts={}", item.id, item.state, item.attempts)?;
        if let Some(error) = &item.last_error {
            write!(w, "  error={error}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn render_status_pretty(payload: &StatusOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let c = &payload.counts;
    pretty_section(w, "Run status")?;
    pretty_kv(w, "plan", &payload.plan_hash)?;
    pretty_kv(
        w,
        "items",
        format!(
            "{} done, {} failed, {} blocked, {} pending",
            c.done, c.failed, c.blocked, c.pending
        ),
    )?;
    pretty_kv(w, "retries", format!("up to {} attempt(s) per item", payload.max_attempts))?;
    writeln!(w)?;

    let width = payload.items.iter().map(|i| i.id.len()).max().unwrap_or(0);
    for item in &payload.items {
        write!(
            w,
            "  {:<width$}  {:<11}  {}/{}",
            item.id, item.state, item.attempts, payload.max_attempts
        )?;
        if let Some(error) = &item.last_error {
            write!(w, "  {error}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}
