//! `lu completions`: shell completion scripts.

use std::io::Write;

use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `lu completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `lu` to `out`.
pub fn write_completions(shell: Shell, command: &mut clap::Command, out: &mut dyn Write) {
    generate(shell, command, "lu", out);
}

/// Execute `lu completions`.
pub fn run_completions(args: &CompletionsArgs, command: &mut clap::Command) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_completions(args.shell, command, &mut out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> clap::Command {
        clap::Command::new("lu")
            .subcommand(clap::Command::new("run"))
            .subcommand(clap::Command::new("check"))
    }

    #[test]
    fn bash_script_registers_lu() {
        let mut out = Vec::new();
        write_completions(Shell::Bash, &mut command(), &mut out);
        let script = String::from_utf8(out).expect("utf8");
        assert!(script.contains("_lu()"));
        assert!(script.contains("check"));
    }

    #[test]
    fn zsh_script_is_generated() {
        let mut out = Vec::new();
        write_completions(Shell::Zsh, &mut command(), &mut out);
        assert!(String::from_utf8(out).expect("utf8").starts_with("#compdef lu"));
    }
}
