//! `ratsync plan --to <ref> [--json]`: preview an upgrade.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ratsync_sync::{compute_plan, Action, Plan};

/// Arguments for `ratsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Target template reference, `rat:<locator>@<ref>`.
    #[arg(long, value_name = "REF")]
    pub to: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self, repo: &Path) -> Result<()> {
        let (lock, template) = super::load_target(repo, &self.to)?;
        let plan = compute_plan(&lock, repo, &template.root).context("failed to compute plan")?;

        if self.json {
            print_json(&lock.version(), &self.to, &plan)?;
        } else {
            print_table(&lock.version(), &self.to, &plan);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct PlanJson<'a> {
    from: &'a str,
    to: &'a str,
    summary: PlanSummaryJson,
    items: &'a [ratsync_sync::PlanItem],
}

#[derive(Serialize)]
struct PlanSummaryJson {
    items: usize,
    changes: usize,
    conflicts: usize,
}

#[derive(Tabled)]
struct PlanTableRow {
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "strategy")]
    strategy: String,
    #[tabled(rename = "rule")]
    rule: String,
    #[tabled(rename = "note")]
    note: String,
}

fn print_json(from: &str, to: &str, plan: &Plan) -> Result<()> {
    let payload = PlanJson {
        from,
        to,
        summary: PlanSummaryJson {
            items: plan.items.len(),
            changes: plan.changes().count(),
            conflicts: plan.conflict_count,
        },
        items: &plan.items,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
    );
    Ok(())
}

fn print_table(from: &str, to: &str, plan: &Plan) {
    println!(
        "ratsync v{} | {from} -> {to} | {} changes | {} conflicts",
        env!("CARGO_PKG_VERSION"),
        plan.changes().count(),
        plan.conflict_count,
    );
    if plan.items.is_empty() {
        println!("No managed files.");
        return;
    }

    let rows: Vec<PlanTableRow> = plan
        .items
        .iter()
        .map(|item| PlanTableRow {
            path: item.path.clone(),
            action: action_label(item.action),
            strategy: item.strategy.to_string(),
            rule: item.matched_rule.clone(),
            note: match (item.binary, item.had_conflict) {
                (true, _) => "binary".to_string(),
                (false, true) => "conflict".to_string(),
                (false, false) => String::new(),
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if plan.changes().count() > 0 {
        println!("Run 'ratsync apply --to {to}' to carry out this plan.");
    }
}

fn action_label(action: Action) -> String {
    let label = action.as_str().to_uppercase();
    match action {
        Action::Create => label.green().bold().to_string(),
        Action::Overwrite => label.yellow().bold().to_string(),
        Action::Edit => label.cyan().bold().to_string(),
        Action::Delete => label.red().bold().to_string(),
        Action::Orphan => label.magenta().bold().to_string(),
        Action::Keep => label.bright_black().to_string(),
    }
}
