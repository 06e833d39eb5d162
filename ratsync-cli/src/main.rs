//! ratsync: keep a repository in step with a template repository.
//!
//! # Usage
//!
//! ```text
//! ratsync [--repo DIR] [-v] adopt --template rat:<locator>@<ref> [--managed PATH[:STRATEGY]]...
//! ratsync plan --to rat:<locator>@<ref> [--json]
//! ratsync apply --to rat:<locator>@<ref> [--dry-run]
//! ratsync diff --to rat:<locator>@<ref>
//! ratsync drift [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    adopt::AdoptArgs, apply::ApplyArgs, diff::DiffArgs, drift::DriftArgs, plan::PlanArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ratsync",
    version,
    about = "Synchronize a repository with a template repository",
    long_about = None,
)]
struct Cli {
    /// Repository root to operate on.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Log per-file decisions (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bind the repository to a template and write the lock record.
    Adopt(AdoptArgs),

    /// Show what an upgrade to a template ref would change.
    Plan(PlanArgs),

    /// Upgrade the repository to a template ref.
    Apply(ApplyArgs),

    /// Show unified diffs of what apply would write.
    Diff(DiffArgs),

    /// Report how the repository drifted from the last applied template.
    Drift(DriftArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Adopt(args) => args.run(&cli.repo),
        Commands::Plan(args) => args.run(&cli.repo),
        Commands::Apply(args) => args.run(&cli.repo),
        Commands::Diff(args) => args.run(&cli.repo),
        Commands::Drift(args) => args.run(&cli.repo),
    }
}
