//! `lu check`: validate a plan without running it.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use lineup_core::config::SequencerConfig;
use lineup_core::graph::topological_layers;
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `lu check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Plan file (.json, .yaml/.yml or .toml).
    pub plan: PathBuf,
}

#[derive(Debug, Serialize)]
struct CheckOutput {
    valid: bool,
    items: usize,
    edges: usize,
    layers: usize,
    plan_hash: String,
}

/// Execute `lu check`.
pub fn run_check(args: &CheckArgs, output: OutputMode) -> anyhow::Result<()> {
    // Attempts do not matter for validation.
    let (_, sequencer) = super::open_plan(&args.plan, &SequencerConfig::default(), output)?;
    let store = sequencer.store();

    let payload = CheckOutput {
        valid: true,
        items: store.len(),
        edges: store.edge_count(),
        layers: topological_layers(store).len(),
        plan_hash: store.content_hash().to_string(),
    };

    render_mode(
        output,
        &payload,
        |p, w| render_check_text(p, w),
        |p, w| render_check_pretty(p, &args.plan, w),
    )
}

fn render_check_text(payload: &CheckOutput, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "ok items={} edges={} layers={} hash={}",
        payload.items, payload.edges, payload.layers, payload.plan_hash
    )
}

fn render_check_pretty(payload: &CheckOutput, plan: &Path, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Plan {} is valid", plan.display()))?;
    pretty_kv(w, "items", payload.items.to_string())?;
    pretty_kv(w, "edges", payload.edges.to_string())?;
    pretty_kv(w, "layers", payload.layers.to_string())?;
    pretty_kv(w, "hash", &payload.plan_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> CheckOutput {
        CheckOutput {
            valid: true,
            items: 3,
            edges: 2,
            layers: 3,
            plan_hash: "blake3:abc".to_string(),
        }
    }

    #[test]
    fn text_is_a_single_line() {
        let mut out = Vec::new();
        render_check_text(&payload(), &mut out).expect("render");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "ok items=3 edges=2 layers=3 hash=blake3:abc\n"
        );
    }

    #[test]
    fn pretty_names_the_plan() {
        let mut out = Vec::new();
        render_check_pretty(&payload(), Path::new("plan.yaml"), &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.starts_with("Plan plan.yaml is valid"));
        assert!(rendered.contains("blake3:abc"));
    }
}
