//! `ratsync adopt --template <ref> [--managed PATH[:STRATEGY]]...`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use ratsync_core::{ManagedRule, RenderRule};

/// Bind the repository to a template.
#[derive(Args, Debug)]
pub struct AdoptArgs {
    /// Template reference, `rat:<locator>@<ref>`.
    #[arg(long, value_name = "REF")]
    pub template: String,

    /// Managed path or glob, optionally suffixed `:enforce`, `:preserve` or `:merge`.
    #[arg(long = "managed", value_name = "PATH[:STRATEGY]")]
    pub managed: Vec<ManagedRule>,

    /// Glob of paths never touched by sync.
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Regex render rule, `PATTERN=>REPLACEMENT`.
    #[arg(long = "render", value_name = "PATTERN=>REPLACEMENT")]
    pub render: Vec<String>,

    /// Literal render rule, `FROM=>TO`.
    #[arg(long = "render-literal", value_name = "FROM=>TO")]
    pub render_literal: Vec<String>,

    /// Validate and print the record without writing it.
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_render(raw: &str, literal: bool) -> Result<RenderRule> {
    let (pattern, replacement) = raw
        .split_once("=>")
        .with_context(|| format!("render rule '{raw}' must have the form PATTERN=>REPLACEMENT"))?;
    Ok(RenderRule::new(pattern, replacement, literal)?)
}

impl AdoptArgs {
    pub fn run(self, repo: &Path) -> Result<()> {
        let mut render_rules = Vec::new();
        for raw in &self.render {
            render_rules.push(parse_render(raw, false)?);
        }
        for raw in &self.render_literal {
            render_rules.push(parse_render(raw, true)?);
        }

        let lock = ratsync_sync::adopt(
            repo,
            &self.template,
            self.managed,
            self.ignore,
            render_rules,
            self.dry_run,
        )
        .with_context(|| format!("failed to adopt '{}'", self.template))?;

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        println!(
            "{prefix}✓ Adopted {} ({} managed rules)",
            lock.version(),
            lock.managed_rules().len()
        );
        for rule in lock.managed_rules().iter() {
            println!("  {rule}");
        }
        if !self.dry_run {
            println!(
                "  Saved to: {}",
                ratsync_core::lockfile::lock_path_at(repo).display()
            );
        }
        Ok(())
    }
}
