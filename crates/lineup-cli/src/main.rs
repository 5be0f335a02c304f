#![forbid(unsafe_code)]

mod cmd;
mod executor;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use lineup_core::config::load_user_config;
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lu: run work items in dependency order",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Inspect",
        about = "Validate a plan",
        long_about = "Load a plan, reject cycles and unknown references, and print its size and hash.",
        after_help = "EXAMPLES:\n    # Validate a plan\n    lu check plan.yaml\n\n    # Emit machine-readable output\n    lu check plan.yaml --json"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Inspect",
        about = "List items that may start now",
        long_about = "List pending items whose blockers are all done, plus failed items awaiting a retry.",
        after_help = "EXAMPLES:\n    # What can start on a fresh plan\n    lu ready plan.yaml\n\n    # What can start after a previous run\n    lu ready plan.yaml --state-file .lineup/state.json"
    )]
    Ready(cmd::ready::ReadyArgs),

    #[command(
        next_help_heading = "Inspect",
        about = "Show parallel execution layers",
        long_about = "Group items into layers that can run side by side once earlier layers are done.",
        after_help = "EXAMPLES:\n    # Show layers\n    lu plan plan.yaml\n\n    # Show why each item sits in its layer\n    lu plan plan.yaml --explain"
    )]
    Plan(cmd::plan::PlanArgs),

    #[command(
        next_help_heading = "Execute",
        about = "Run a plan",
        long_about = "Run every item's command in dependency order, retrying failures up to max_attempts.",
        after_help = "EXAMPLES:\n    # Run with defaults from .lineup/config.toml\n    lu run plan.yaml\n\n    # Four at a time, resumable\n    lu run plan.yaml -j 4 --state-file .lineup/state.json\n\n    # Walk the plan without running commands\n    lu run plan.yaml --dry-run"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        next_help_heading = "Execute",
        about = "Show a saved run state",
        long_about = "Render the per-item state stored in a snapshot written by `lu run --state-file`.",
        after_help = "EXAMPLES:\n    # Show saved progress\n    lu status --state-file .lineup/state.json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    lu completions bash\n\n    # Generate zsh completions\n    lu completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("LINEUP_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "lineup_core=debug,lu=debug,info"
        } else {
            "lineup_core=info,lu=info,warn"
        })
    });

    let format = env::var("LINEUP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let user = load_user_config().unwrap_or_else(|e| {
        warn!("ignoring user config: {e:#}");
        lineup_core::config::UserConfig::default()
    });
    let output = resolve_output_mode(cli.format, cli.json, user.output.as_deref());
    debug!(?output, "output mode resolved");

    let project_root = env::current_dir()?;

    match cli.command {
        Commands::Check(ref args) => cmd::check::run_check(args, output),
        Commands::Ready(ref args) => cmd::ready::run_ready(args, output),
        Commands::Plan(ref args) => cmd::plan::run_plan(args, output),
        Commands::Run(ref args) => cmd::run::run_run(args, output, &project_root),
        Commands::Status(ref args) => cmd::status::run_status(args, output),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args, &mut command)
        }
    }
}
