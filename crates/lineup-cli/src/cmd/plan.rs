//! `lu plan`: topological execution layers for parallel work.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use lineup_core::config::SequencerConfig;
use lineup_core::graph::{LayerEntry, explain_layers};
use serde::Serialize;

use crate::output::{OutputMode, render};

/// Arguments for `lu plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Plan file (.json, .yaml/.yml or .toml).
    pub plan: PathBuf,

    /// Include dependency explanations for each layered item.
    #[arg(long)]
    pub explain: bool,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    layers: Vec<Vec<LayerEntry>>,
}

/// Execute `lu plan`.
pub fn run_plan(args: &PlanArgs, output: OutputMode) -> anyhow::Result<()> {
    let (plan, sequencer) = super::open_plan(&args.plan, &SequencerConfig::default(), output)?;
    let payload = PlanOutput {
        layers: explain_layers(sequencer.store()),
    };

    let titles: HashMap<&str, &str> = plan
        .items
        .iter()
        .filter_map(|item| item.title.as_deref().map(|title| (item.id.as_str(), title)))
        .collect();

    render(output, &payload, |payload, w| {
        render_plan_human(payload, &titles, args.explain, w)
    })
}

fn render_plan_human(
    payload: &PlanOutput,
    titles: &HashMap<&str, &str>,
    explain: bool,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(w, "Parallel execution plan")?;

    if payload.layers.is_empty() {
        writeln!(w, "(no items)")?;
        return Ok(());
    }

    for (idx, layer) in payload.layers.iter().enumerate() {
        let noun = if layer.len() == 1 { "item" } else { "items" };
        writeln!(w, "\nLayer {} ({} {noun}):", idx + 1, layer.len())?;

        for entry in layer {
            if let Some(title) = titles.get(entry.id.as_str()) {
                writeln!(w, "  - {} — {title}", entry.id)?;
            } else {
                writeln!(w, "  - {}", entry.id)?;
            }

            if explain {
                if entry.blocked_by.is_empty() {
                    writeln!(w, "    ready: no blockers")?;
                } else {
                    writeln!(w, "    depends_on: {}", entry.blocked_by.join(", "))?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_args_parse_explain_flag() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: PlanArgs,
        }

        let parsed = Wrapper::parse_from(["test", "plan.yaml", "--explain"]);
        assert_eq!(parsed.args.plan, PathBuf::from("plan.yaml"));
        assert!(parsed.args.explain);
    }

    #[test]
    fn render_plan_human_empty_plan() {
        let payload = PlanOutput { layers: Vec::new() };
        let mut out = Vec::new();

        render_plan_human(&payload, &HashMap::new(), false, &mut out).expect("render");

        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.contains("Parallel execution plan"));
        assert!(rendered.contains("(no items)"));
    }

    #[test]
    fn render_plan_human_explains_blockers() {
        let payload = PlanOutput {
            layers: vec![
                vec![LayerEntry {
                    id: "a".to_string(),
                    blocked_by: Vec::new(),
                }],
                vec![LayerEntry {
                    id: "b".to_string(),
                    blocked_by: vec!["a".to_string()],
                }],
            ],
        };
        let titles = HashMap::from([("b", "Ship it")]);
        let mut out = Vec::new();

        render_plan_human(&payload, &titles, true, &mut out).expect("render");

        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.contains("Layer 1 (1 item):"));
        assert!(rendered.contains("  - b — Ship it"));
        assert!(rendered.contains("    ready: no blockers"));
        assert!(rendered.contains("    depends_on: a"));
    }
}
