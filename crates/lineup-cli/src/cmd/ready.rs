//! `lu ready`: items that may start now.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use lineup_core::State;
use lineup_core::config::SequencerConfig;
use serde::Serialize;

use crate::output::{OutputMode, pretty_section, render_mode};

/// Arguments for `lu ready`.
#[derive(Args, Debug)]
pub struct ReadyArgs {
    /// Plan file (.json, .yaml/.yml or .toml).
    pub plan: PathBuf,

    /// Resume from a state file written by `lu run`.
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ReadyEntry {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    retry: bool,
    attempts: u32,
}

#[derive(Debug, Serialize)]
struct ReadyOutput {
    ready: Vec<ReadyEntry>,
    remaining: usize,
}

/// Execute `lu ready`.
pub fn run_ready(args: &ReadyArgs, output: OutputMode) -> anyhow::Result<()> {
    let (plan, mut sequencer) = super::open_plan(&args.plan, &SequencerConfig::default(), output)?;
    if let Some(snapshot) = super::read_state(args.state_file.as_deref())? {
        super::apply_state(&mut sequencer, &snapshot, output)?;
    }

    let titles = plan.by_id();
    let ready = sequencer
        .next_batch()
        .into_iter()
        .filter_map(|id| sequencer.item(id))
        .map(|item| ReadyEntry {
            id: item.id.clone(),
            title: titles.get(item.id.as_str()).and_then(|p| p.title.clone()),
            retry: item.state == State::Blocked,
            attempts: item.attempts,
        })
        .collect();

    let payload = ReadyOutput {
        ready,
        remaining: sequencer.counts().unterminated(),
    };

    render_mode(output, &payload, render_ready_text, render_ready_pretty)
}

fn render_ready_text(payload: &ReadyOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for entry in &payload.ready {
        if entry.retry {
            writeln!(w, "{}  retry  attempts={}", entry.id, entry.attempts)?;
        } else {
            writeln!(w, "{}", entry.id)?;
        }
    }
    Ok(())
}

fn render_ready_pretty(payload: &ReadyOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Ready to start")?;
    if payload.ready.is_empty() {
        if payload.remaining == 0 {
            writeln!(w, "(all items finished)")?;
        } else {
            writeln!(w, "(nothing ready; {} item(s) waiting)", payload.remaining)?;
        }
        return Ok(());
    }
    for entry in &payload.ready {
        match &entry.title {
            Some(title) => write!(w, "  - {} — {title}", entry.id)?,
            None => write!(w, "  - {}", entry.id)?,
        }
        if entry.retry {
            write!(w, "  (retry after {} attempt(s))", entry.attempts)?;
        }
        writeln!(w)?;
    }
    Ok(())
}
