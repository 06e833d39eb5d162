//! `ratsync diff --to <ref>`: show unified diffs for what apply would write.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use ratsync_sync::{compute_plan, diff_plan};

/// Arguments for `ratsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Target template reference, `rat:<locator>@<ref>`.
    #[arg(long, value_name = "REF")]
    pub to: String,
}

impl DiffArgs {
    pub fn run(self, repo: &Path) -> Result<()> {
        let (lock, template) = super::load_target(repo, &self.to)?;
        let plan = compute_plan(&lock, repo, &template.root).context("failed to compute plan")?;
        let diffs = diff_plan(&lock, repo, &template.root, &plan)
            .with_context(|| format!("diff against '{}' failed", self.to))?;

        if diffs.is_empty() {
            println!("No differences for '{}'.", self.to);
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
