//! Executors used by `lu run`.

use std::process::{Command, ExitStatus, Stdio};

use lineup_core::{Executor, Outcome, PlanItem};
use tracing::{debug, info};

/// Runs each item's `command` through `<shell> -c`.
///
/// Items without a command succeed immediately. Output is captured, not
/// forwarded, so `lu` keeps control of stdout.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Executor for ShellExecutor {
    fn execute(&self, item: &PlanItem) -> Outcome {
        let Some(command) = item.command.as_deref() else {
            debug!(item = %item.id, "no command; marking done");
            return Outcome::Success;
        };

        info!(item = %item.id, %command, "running");
        let result = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output();

        match result {
            Ok(output) if output.status.success() => Outcome::Success,
            Ok(output) => Outcome::Failure(failure_reason(output.status, &output.stderr)),
            Err(e) => Outcome::Failure(format!("failed to spawn {}: {e}", self.shell)),
        }
    }
}

/// Succeeds without running anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl Executor for DryRunExecutor {
    fn execute(&self, item: &PlanItem) -> Outcome {
        info!(item = %item.id, command = item.command.as_deref().unwrap_or("-"), "dry run");
        Outcome::Success
    }
}

/// Exit status plus the last non-empty stderr line, if any.
fn failure_reason(status: ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    match stderr.lines().map(str::trim).rfind(|line| !line.is_empty()) {
        Some(line) => format!("{status}: {line}"),
        None => status.to_string(),
    }
}
