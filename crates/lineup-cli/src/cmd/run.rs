//! `lu run`: execute a plan in dependency order.
//!
//! Items run through the shell executor (or the dry-run executor), up to
//! `jobs` at a time. With `--state-file` the run resumes from, and writes
//! back to, a snapshot so an interrupted or failed run can pick up where it
//! stopped.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use lineup_core::config::Overrides;
use lineup_core::sequencer::snapshot::save_snapshot;
use lineup_core::{Driver, RunReport, RunStatus, SharedSequencer};
use tracing::info;

use crate::executor::{DryRunExecutor, ShellExecutor};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `lu run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Plan file (.json, .yaml/.yml or .toml).
    pub plan: PathBuf,

    /// Attempts per item before it is marked failed.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Number of items to execute concurrently.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Resume from and save progress to this snapshot file.
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Give failed items from the state file a fresh set of attempts.
    #[arg(long, requires = "state_file")]
    pub retry_failed: bool,

    /// Walk the plan without running any commands.
    #[arg(long)]
    pub dry_run: bool,

    /// Stop dispatching new work after the first item fails for good.
    #[arg(long)]
    pub stop_on_failure: bool,
}

/// Execute `lu run`.
pub fn run_run(args: &RunArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = super::load_config(
        project_root,
        Overrides {
            max_attempts: args.max_attempts,
            jobs: args.jobs,
            stop_on_failure: args.stop_on_failure,
        },
        output,
    )?;

    let (plan, mut sequencer) = super::open_plan(&args.plan, &project.sequencer, output)?;
    if let Some(mut snapshot) = super::read_state(args.state_file.as_deref())? {
        if args.retry_failed {
            let reset = snapshot.reset_failed();
            info!(count = reset.len(), items = ?reset, "retrying failed items");
        }
        super::apply_state(&mut sequencer, &snapshot, output)?;
    }

    let shared = SharedSequencer::new(sequencer);
    let driver = Driver::new(project.run.jobs, project.run.stop_on_failure);
    let report = if args.dry_run {
        driver.run(&shared, &plan, &DryRunExecutor)
    } else {
        driver.run(&shared, &plan, &ShellExecutor::new(&project.run.shell))
    };
    let report = match report {
        Ok(report) => report,
        Err(e) => return super::fail_with(output, e),
    };

    if !args.dry_run {
        if let Some(path) = &args.state_file {
            save_snapshot(path, &shared.snapshot())?;
            info!(path = %path.display(), "state saved");
        }
    }

    render_mode(output, &report, render_run_text, render_run_pretty)?;

    if report.status.is_success() {
        Ok(())
    } else {
        anyhow::bail!("run {}", status_label(report.status))
    }
}

const fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Halted => "halted",
        RunStatus::Deadlocked => "deadlocked",
    }
}

fn render_run_text(report: &RunReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{} done={} failed={} remaining={} attempts={}",
        status_label(report.status),
        report.done.len(),
        report.failed.len(),
        report.remaining.len(),
        report.attempts
    )?;
    for failed in &report.failed {
        writeln!(
            w,
            "failed {} attempts={} {}",
            failed.id,
            failed.attempts,
            failed.reason.as_deref().unwrap_or("")
        )?;
    }
    for stuck in &report.stuck {
        writeln!(w, "stuck {} waiting_on={}", stuck.id, waiting_on(stuck))?;
    }
    Ok(())
}

fn render_run_pretty(report: &RunReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Run {}", status_label(report.status)))?;
    pretty_kv(w, "plan", &report.plan_hash)?;
    pretty_kv(w, "done", report.done.len().to_string())?;
    pretty_kv(w, "failed", report.failed.len().to_string())?;
    pretty_kv(w, "attempts", report.attempts.to_string())?;

    if !report.failed.is_empty() {
        writeln!(w, "\nFailed:")?;
        for failed in &report.failed {
            let noun = if failed.attempts == 1 { "attempt" } else { "attempts" };
            match &failed.reason {
                Some(reason) => {
                    writeln!(w, "  - {} ({} {noun}): {reason}", failed.id, failed.attempts)?;
                }
                None => writeln!(w, "  - {} ({} {noun})", failed.id, failed.attempts)?,
            }
        }
    }

    if !report.stuck.is_empty() {
        writeln!(w, "\nCan never start:")?;
        for stuck in &report.stuck {
            writeln!(w, "  - {} (waiting on {})", stuck.id, waiting_on(stuck))?;
        }
    } else if !report.remaining.is_empty() {
        writeln!(w, "\nNot started: {}", report.remaining.join(", "))?;
    }

    Ok(())
}

fn waiting_on(stuck: &lineup_core::sequencer::StuckItem) -> String {
    stuck
        .unmet_blockers
        .iter()
        .map(|blocker| format!("{} [{}]", blocker.id, blocker.state))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineup_core::FailedItem;
    use lineup_core::State;
    use lineup_core::sequencer::{StuckItem, UnmetBlocker};

    fn deadlocked() -> RunReport {
        RunReport {
            status: RunStatus::Deadlocked,
            plan_hash: "blake3:abc".to_string(),
            done: vec!["c".to_string()],
            failed: vec![FailedItem {
                id: "a".to_string(),
                attempts: 2,
                reason: Some("exit status: 1".to_string()),
            }],
            remaining: vec!["b".to_string()],
            stuck: vec![StuckItem {
                id: "b".to_string(),
                state: State::Pending,
                unmet_blockers: vec![UnmetBlocker {
                    id: "a".to_string(),
                    state: State::Failed,
                }],
            }],
            attempts: 3,
        }
    }

    #[test]
    fn run_args_parse_all_flags() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: RunArgs,
        }

        let parsed = Wrapper::parse_from([
            "test",
            "plan.toml",
            "--max-attempts",
            "5",
            "-j",
            "4",
            "--state-file",
            "state.json",
            "--retry-failed",
            "--dry-run",
            "--stop-on-failure",
        ]);
        assert_eq!(parsed.args.max_attempts, Some(5));
        assert_eq!(parsed.args.jobs, Some(4));
        assert_eq!(parsed.args.state_file, Some(PathBuf::from("state.json")));
        assert!(parsed.args.retry_failed);
        assert!(parsed.args.dry_run);
        assert!(parsed.args.stop_on_failure);
    }

    #[test]
    fn retry_failed_requires_state_file() {
        use clap::Parser;

        #[derive(Parser, Debug)]
        struct Wrapper {
            #[command(flatten)]
            args: RunArgs,
        }

        assert!(Wrapper::try_parse_from(["test", "plan.toml", "--retry-failed"]).is_err());
    }

    #[test]
    fn text_lists_failures_and_stuck_items() {
        let mut out = Vec::new();
        render_run_text(&deadlocked(), &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.starts_with("deadlocked done=1 failed=1 remaining=1 attempts=3\n"));
        assert!(rendered.contains("failed a attempts=2 exit status: 1"));
        assert!(rendered.contains("stuck b waiting_on=a [failed]"));
    }

    #[test]
    fn pretty_explains_why_items_never_started() {
        let mut out = Vec::new();
        render_run_pretty(&deadlocked(), &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.starts_with("Run deadlocked"));
        assert!(rendered.contains("  - a (2 attempts): exit status: 1"));
        assert!(rendered.contains("  - b (waiting on a [failed])"));
        assert!(!rendered.contains("Not started"));
    }
}
