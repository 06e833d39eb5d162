//! Adoption: binds a repository to a template for the first time.

use std::path::Path;

use ratsync_core::{lockfile, LockError, LockRecord, ManagedRule, RenderRule, RuleSet, TemplateRef};
use ratsync_renderer::Renderer;

use crate::error::SyncError;
use crate::matcher::RuleMatcher;

/// Build and validate a lock record from adoption inputs.
///
/// Globs and render regexes are compiled here so a bad rule is rejected
/// before anything is written.
pub fn create_adoption_record(
    template_ref: &str,
    managed: Vec<ManagedRule>,
    ignore: Vec<String>,
    render_rules: Vec<RenderRule>,
) -> Result<LockRecord, SyncError> {
    let reference = TemplateRef::parse(template_ref)?;
    let lock = LockRecord::new(reference.to_source(), RuleSet::new(managed), ignore, render_rules);
    RuleMatcher::compile(&lock)?;
    Renderer::new(lock.render_rules())?;
    Ok(lock)
}

/// Adopt `template_ref` for the repository at `repo_root`.
///
/// Fails when the repository already has a lock record. In dry-run mode the
/// record is validated and returned but not written.
pub fn adopt(
    repo_root: &Path,
    template_ref: &str,
    managed: Vec<ManagedRule>,
    ignore: Vec<String>,
    render_rules: Vec<RenderRule>,
    dry_run: bool,
) -> Result<LockRecord, SyncError> {
    if lockfile::exists_at(repo_root) {
        return Err(LockError::AlreadyAdopted {
            path: lockfile::lock_path_at(repo_root),
        }
        .into());
    }
    let lock = create_adoption_record(template_ref, managed, ignore, render_rules)?;
    if dry_run {
        tracing::info!("[dry-run] would adopt {}", lock.version());
    } else {
        lockfile::create_at(repo_root, &lock)?;
        tracing::info!("adopted {} ({} rules)", lock.version(), lock.managed_rules().len());
    }
    Ok(lock)
}
