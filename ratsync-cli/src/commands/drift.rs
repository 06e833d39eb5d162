//! `ratsync drift [--json]`: compare the repository with its bound template.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ratsync_sync::{detect_drift, resolve_source, DriftReport};

/// Arguments for `ratsync drift`.
#[derive(Args, Debug)]
pub struct DriftArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl DriftArgs {
    pub fn run(self, repo: &Path) -> Result<()> {
        let lock = super::load_lock(repo)?;
        let template = resolve_source(lock.template(), &super::base_dir()?)
            .with_context(|| format!("cannot resolve bound template {}", lock.version()))?;
        let report =
            detect_drift(&lock, repo, &template.root).context("drift detection failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize drift JSON")?
            );
        } else {
            print_table(&report);
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct DriftTableRow {
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "drift")]
    drift: String,
}

fn print_table(report: &DriftReport) {
    println!("ratsync drift | baseline {}", report.baseline_version);

    let groups: [(&[String], String); 5] = [
        (&report.conflicts, "CONFLICT".red().bold().to_string()),
        (&report.local_only, "LOCAL".yellow().bold().to_string()),
        (&report.template_only, "TEMPLATE".cyan().bold().to_string()),
        (&report.diverged, "DIVERGED".magenta().bold().to_string()),
        (&report.unmanaged, "UNMANAGED".bright_black().to_string()),
    ];
    let rows: Vec<DriftTableRow> = groups
        .iter()
        .flat_map(|(paths, label)| {
            paths.iter().map(move |p| DriftTableRow {
                path: p.clone(),
                drift: label.clone(),
            })
        })
        .collect();

    if report.is_clean() {
        println!("{} in sync with the template", "✓".green().bold());
    }
    if rows.is_empty() {
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
