//! Dry-run unified diff support for `ratsync diff`.

use std::path::{Path, PathBuf};

use similar::TextDiff;

use ratsync_core::LockRecord;
use ratsync_renderer::{Rendered, Renderer};

use crate::baseline;
use crate::blocks::enforce_ours_blocks;
use crate::error::{io_err, SyncError};
use crate::merge::{merge, merge3};
use crate::plan::{Action, Plan};
use crate::tree::read_text_if_exists;

/// A single previewed file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path relative to the repository root.
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Compare what apply would write for each changing text item with the
/// current on-disk content.
///
/// No files are written. Binary items and orphans are skipped.
pub fn diff_plan(
    lock: &LockRecord,
    repo_root: &Path,
    template_root: &Path,
    plan: &Plan,
) -> Result<Vec<FileDiff>, SyncError> {
    let renderer = Renderer::new(lock.render_rules())?;
    let baseline = baseline::load_at(repo_root)?;

    let mut diffs = Vec::new();
    for item in plan.changes() {
        if item.binary || item.action == Action::Orphan {
            continue;
        }
        let existing = read_text_if_exists(&repo_root.join(&item.path))?;
        let proposed = match item.action {
            Action::Delete => String::new(),
            _ => {
                let src = template_root.join(&item.path);
                let bytes = std::fs::read(&src).map_err(|e| io_err(&src, e))?;
                let Rendered::Text(theirs) = renderer.render_bytes(bytes) else {
                    continue;
                };
                match (&existing, item.action) {
                    (Some(ours), Action::Edit) => {
                        let merged = match baseline.get(&item.path) {
                            Some(base) => merge3(base, ours, &theirs),
                            None => merge(ours, &theirs),
                        };
                        enforce_ours_blocks(ours, &merged.text).0
                    }
                    (Some(ours), _) => enforce_ours_blocks(ours, &theirs).0,
                    (None, _) => theirs,
                }
            }
        };

        let current = existing.unwrap_or_default();
        if current == proposed {
            continue;
        }
        let old_header = format!("a/{}", item.path);
        let new_header = format!("b/{}", item.path);
        let unified = TextDiff::from_lines(&current, &proposed)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();
        diffs.push(FileDiff {
            path: PathBuf::from(&item.path),
            unified_diff: unified,
        });
    }
    Ok(diffs)
}
