//! `ratsync apply --to <ref> [--dry-run]`: upgrade the repository.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ratsync_sync::{apply_plan, compute_plan, ApplyOutcome, ApplyResult};

/// Arguments for `ratsync apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Target template reference, `rat:<locator>@<ref>`.
    #[arg(long, value_name = "REF")]
    pub to: String,

    /// Show what would change without writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl ApplyArgs {
    pub fn run(self, repo: &Path) -> Result<()> {
        let (lock, template) = super::load_target(repo, &self.to)?;
        let plan = compute_plan(&lock, repo, &template.root).context("failed to compute plan")?;
        let outcome = apply_plan(&lock, repo, &template, &plan, self.dry_run)
            .with_context(|| format!("apply to '{}' failed", self.to))?;
        print_outcome(repo, &outcome, self.dry_run);
        Ok(())
    }
}

fn print_outcome(repo: &Path, outcome: &ApplyOutcome, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if outcome.files_changed == 0 && outcome.conflicts_resolved == 0 {
        println!(
            "{prefix}✓ {}: nothing to do",
            outcome.updated_lock.version()
        );
    } else {
        println!(
            "{prefix}✓ {} applied ({} files changed, {} conflicts resolved)",
            outcome.updated_lock.version(),
            outcome.files_changed,
            outcome.conflicts_resolved
        );
    }

    let rel = |p: &Path| p.strip_prefix(repo).unwrap_or(p).display().to_string();
    for r in &outcome.results {
        match r {
            ApplyResult::Created { path } => println!("  +  {}", rel(path)),
            ApplyResult::Overwritten { path } => println!("  ✎  {}", rel(path)),
            ApplyResult::Merged { path, conflicted } => {
                if *conflicted {
                    println!("  {}  {} (conflict markers)", "!".red().bold(), rel(path));
                } else {
                    println!("  ⇄  {}", rel(path));
                }
            }
            ApplyResult::Deleted { path } => println!("  -  {}", rel(path)),
            ApplyResult::Orphaned { path, renamed_to } => {
                println!("  ?  {} -> {}", rel(path), rel(renamed_to))
            }
            ApplyResult::WouldApply { path, action } => println!("  ~  {} ({action})", rel(path)),
            ApplyResult::BinarySkipped { path } => println!("  ·  {} (binary)", rel(path)),
            ApplyResult::Unchanged { .. } | ApplyResult::Kept { .. } => {}
        }
    }

    for warning in &outcome.warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
}
