pub mod adopt;
pub mod apply;
pub mod diff;
pub mod drift;
pub mod plan;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use ratsync_core::{lockfile, LockRecord, ResolvedTemplate, TemplateRef};
use ratsync_sync::resolve_template;

/// Directory relative template locators are resolved against.
pub(crate) fn base_dir() -> Result<PathBuf> {
    std::env::current_dir().context("could not determine current directory")
}

/// Load the repository's lock record, with a hint when it is missing.
pub(crate) fn load_lock(repo: &Path) -> Result<LockRecord> {
    lockfile::load_at(repo).with_context(|| {
        format!(
            "failed to load lock record for '{}' (run `ratsync adopt` first)",
            repo.display()
        )
    })
}

/// Lock record plus the resolved `--to` template.
pub(crate) fn load_target(repo: &Path, to: &str) -> Result<(LockRecord, ResolvedTemplate)> {
    let lock = load_lock(repo)?;
    let reference = TemplateRef::parse(to).with_context(|| format!("invalid --to '{to}'"))?;
    let template = resolve_template(&reference, &base_dir()?)
        .with_context(|| format!("cannot resolve template '{reference}'"))?;
    Ok((lock, template))
}
