//! Drift detection: how a repository has moved away from the template
//! content it was last synchronized with.
//!
//! Classification precedence for a managed file present in both trees:
//! 1. `conflicts` (unresolved conflict markers, or both sides changed
//!    differently since the baseline snapshot)
//! 2. `local_only` (only the local file changed since the snapshot)
//! 3. `template_only` (only the template changed since the snapshot)
//! 4. `diverged` (no snapshot, and local content differs from the template)

use std::path::Path;

use serde::Serialize;

use ratsync_core::LockRecord;
use ratsync_renderer::Renderer;

use crate::baseline;
use crate::error::SyncError;
use crate::matcher::RuleMatcher;
use crate::merge::has_conflict_markers;
use crate::tree::FileTree;

/// Drift of one repository against its bound template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Ref of the template content last applied.
    pub baseline_version: String,
    pub local_only: Vec<String>,
    pub template_only: Vec<String>,
    pub conflicts: Vec<String>,
    pub diverged: Vec<String>,
    /// Template files matched by no managed rule and not ignored.
    pub unmanaged: Vec<String>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.local_only.is_empty()
            && self.template_only.is_empty()
            && self.conflicts.is_empty()
            && self.diverged.is_empty()
    }
}

/// Compare `repo_root` with the template tree at `template_root`.
///
/// Nothing is written.
pub fn detect_drift(
    lock: &LockRecord,
    repo_root: &Path,
    template_root: &Path,
) -> Result<DriftReport, SyncError> {
    let matcher = RuleMatcher::compile(lock)?;
    let renderer = Renderer::new(lock.render_rules())?;
    let repo = FileTree::scan(repo_root)?;
    let template = FileTree::scan(template_root)?;
    let baseline = baseline::load_at(repo_root)?;

    let mut report = DriftReport {
        baseline_version: lock.applied_ref().to_owned(),
        ..DriftReport::default()
    };

    for path in template.paths() {
        if matcher.is_ignored(path) {
            continue;
        }
        if matcher.best_rule(path).is_none() {
            report.unmanaged.push(path.clone());
            continue;
        }
        if !repo.contains(path) {
            continue;
        }

        let local = repo.read_bytes(path)?;
        let rendered = renderer.render_bytes(template.read_bytes(path)?);
        let local_text = std::str::from_utf8(&local).ok();

        if local_text.is_some_and(has_conflict_markers) {
            report.conflicts.push(path.clone());
            continue;
        }
        match baseline.get(path).map(str::as_bytes) {
            Some(snapshot) => {
                let local_changed = local.as_slice() != snapshot;
                let template_changed = rendered.as_bytes() != snapshot;
                match (local_changed, template_changed) {
                    (true, true) if local.as_slice() != rendered.as_bytes() => {
                        report.conflicts.push(path.clone())
                    }
                    (true, false) => report.local_only.push(path.clone()),
                    (false, true) => report.template_only.push(path.clone()),
                    _ => {}
                }
            }
            None => {
                if local.as_slice() != rendered.as_bytes() {
                    report.diverged.push(path.clone());
                }
            }
        }
    }

    tracing::debug!(
        "drift: {} local, {} template, {} conflicts, {} diverged",
        report.local_only.len(),
        report.template_only.len(),
        report.conflicts.len(),
        report.diverged.len()
    );
    Ok(report)
}
