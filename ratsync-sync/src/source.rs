//! Template resolution: turns a template reference into a local tree.
//!
//! Only local locators resolve. Remote locators (`gh:`, `github:`) are
//! accepted in lock records but there is no transport to fetch them.

use std::path::Path;

use ratsync_core::types::looks_like_commit;
use ratsync_core::{Locator, ResolvedTemplate, TemplateRef, TemplateSource};

use crate::error::SyncError;
use crate::tree::{tree_digest, FileTree};

/// Prefix of synthesized commit ids for non-commit refs of local trees.
pub const SNAPSHOT_PREFIX: &str = "snapshot-";

/// Resolve `reference` to a directory; relative paths are taken from `base_dir`.
///
/// When the ref is not itself a commit hash, the commit recorded for the
/// tree is `snapshot-<12 hex>`, a digest of its paths and contents.
pub fn resolve_template(reference: &TemplateRef, base_dir: &Path) -> Result<ResolvedTemplate, SyncError> {
    let unresolvable = |reason: String| SyncError::UnresolvableTemplate {
        locator: reference.locator.clone(),
        reason,
    };

    let dir = match reference.locator_kind() {
        Locator::Remote(_) => {
            return Err(unresolvable(
                "remote template repositories cannot be fetched; use a local directory".into(),
            ))
        }
        Locator::Local(dir) => dir,
    };
    let root = if dir.is_absolute() { dir } else { base_dir.join(dir) };
    if !root.is_dir() {
        return Err(unresolvable(format!("{} is not a directory", root.display())));
    }

    let commit = if looks_like_commit(&reference.reference) {
        reference.reference.clone()
    } else {
        let digest = tree_digest(&FileTree::scan(&root)?)?;
        format!("{SNAPSHOT_PREFIX}{}", &digest[..12])
    };
    tracing::debug!("resolved {reference} to {} ({commit})", root.display());

    Ok(ResolvedTemplate {
        root,
        repo: reference.locator.clone(),
        reference: reference.reference.clone(),
        commit: Some(commit),
    })
}

/// Resolve the template a lock record is currently bound to.
pub fn resolve_source(source: &TemplateSource, base_dir: &Path) -> Result<ResolvedTemplate, SyncError> {
    let reference = TemplateRef {
        locator: source.repo.clone(),
        reference: source.reference.clone(),
    };
    resolve_template(&reference, base_dir)
}
