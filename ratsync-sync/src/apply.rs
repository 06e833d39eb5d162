//! Apply executor: carries out a [`Plan`] against the repository.
//!
//! ## Per-item protocol
//!
//! 1. Render the template file with the lock record's render rules.
//! 2. Reconcile with local content (block protection or merge).
//! 3. Write to `<path>.ratsync.tmp`.
//! 4. Rename to the final path (atomic on POSIX).
//! 5. Update the baseline snapshot for merge-strategy files.
//!
//! After all items the lock record is advanced to the target template and
//! persisted together with the baseline. File I/O failures abort the run
//! immediately; earlier writes are not rolled back.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use filetime::FileTime;

use ratsync_core::{lockfile, LockRecord, ResolvedTemplate, Strategy};
use ratsync_renderer::{Rendered, Renderer};

use crate::baseline::{self, Baseline};
use crate::blocks::enforce_ours_blocks;
use crate::error::{io_err, SyncError};
use crate::merge::{merge, merge3};
use crate::plan::{Action, Plan, PlanItem};
use crate::tree::{read_text_if_exists, TMP_SUFFIX};

/// Suffix given to locally modified files the template no longer carries.
pub const ORPHAN_SUFFIX: &str = ".orphaned";

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of an individual plan item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    Created { path: PathBuf },
    Overwritten { path: PathBuf },
    /// Enforced content already matched the file on disk.
    Unchanged { path: PathBuf },
    Merged { path: PathBuf, conflicted: bool },
    Deleted { path: PathBuf },
    Orphaned { path: PathBuf, renamed_to: PathBuf },
    Kept { path: PathBuf },
    /// Binary content under the merge strategy; left untouched.
    BinarySkipped { path: PathBuf },
    /// `--dry-run` mode: the action *would* have been carried out.
    WouldApply { path: PathBuf, action: Action },
}

/// Soft failure reported alongside a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyWarning {
    BinaryMerge { path: String },
    BlocksReinserted { path: String, ids: Vec<String> },
    LockNotPersisted { reason: String },
    BaselineNotPersisted { reason: String },
}

impl fmt::Display for ApplyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyWarning::BinaryMerge { path } => {
                write!(f, "{path}: binary file cannot be merged; local copy kept")
            }
            ApplyWarning::BlocksReinserted { path, ids } => write!(
                f,
                "{path}: protected block(s) re-inserted: {}",
                ids.join(", ")
            ),
            ApplyWarning::LockNotPersisted { reason } => {
                write!(f, "lock record not updated: {reason}")
            }
            ApplyWarning::BaselineNotPersisted { reason } => {
                write!(f, "baseline not updated: {reason}")
            }
        }
    }
}

/// Summary of one apply pass.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub files_changed: usize,
    pub conflicts_resolved: usize,
    pub updated_lock: LockRecord,
    pub results: Vec<ApplyResult>,
    pub warnings: Vec<ApplyWarning>,
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()))
}

/// Atomically write `content` to `path`, optionally copying permissions and
/// modification time from `stat_from`.
pub(crate) fn atomic_write(
    path: &Path,
    content: &[u8],
    stat_from: Option<&Path>,
) -> Result<(), SyncError> {
    atomic_write_with_tmp(path, content, stat_from, &tmp_path_for(path))
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &[u8],
    stat_from: Option<&Path>,
    tmp: &Path,
) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Some(src) = stat_from {
        let copied = copy_stat(src, tmp);
        if copied.is_err() {
            let _ = std::fs::remove_file(tmp);
            return copied;
        }
    }

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn copy_stat(src: &Path, dst: &Path) -> Result<(), SyncError> {
    let meta = std::fs::metadata(src).map_err(|e| io_err(src, e))?;
    std::fs::set_permissions(dst, meta.permissions()).map_err(|e| io_err(dst, e))?;
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_mtime(dst, mtime).map_err(|e| io_err(dst, e))
}

/// Remove empty directories from `start` upwards, stopping below `root`.
fn prune_empty_dirs(start: Option<&Path>, root: &Path) {
    let mut dir = start;
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        tracing::debug!("pruned empty directory: {}", d.display());
        dir = d.parent();
    }
}

/// `<name>.orphaned`, or `<name>.<n>.orphaned` when earlier orphans exist.
fn orphan_path(path: &Path) -> PathBuf {
    let base = path.file_name().unwrap_or_default().to_os_string();
    let mut name = base.clone();
    name.push(ORPHAN_SUFFIX);
    let mut candidate = path.with_file_name(&name);
    let mut n = 1usize;
    while candidate.exists() {
        let mut name = base.clone();
        name.push(format!(".{n}{ORPHAN_SUFFIX}"));
        candidate = path.with_file_name(name);
        n += 1;
    }
    candidate
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

struct Executor<'a> {
    repo_root: &'a Path,
    template_root: &'a Path,
    renderer: Renderer,
    baseline: Baseline,
    dry_run: bool,
    files_changed: usize,
    conflicts_resolved: usize,
    results: Vec<ApplyResult>,
    warnings: Vec<ApplyWarning>,
}

impl<'a> Executor<'a> {
    fn render(&self, rel: &str) -> Result<Rendered, SyncError> {
        let src = self.template_root.join(rel);
        let bytes = std::fs::read(&src).map_err(|e| io_err(&src, e))?;
        Ok(self.renderer.render_bytes(bytes))
    }

    fn would_apply(&mut self, dst: PathBuf, action: Action) {
        tracing::info!("[dry-run] would {action}: {}", dst.display());
        self.results.push(ApplyResult::WouldApply { path: dst, action });
    }

    fn run(&mut self, item: &PlanItem) -> Result<(), SyncError> {
        let dst = self.repo_root.join(&item.path);
        match item.action {
            Action::Keep => self.keep(item, dst),
            Action::Create | Action::Overwrite => self.write_template(item, dst),
            Action::Edit => self.edit(item, dst),
            Action::Delete => self.delete(item, dst),
            Action::Orphan => self.orphan(item, dst),
        }
    }

    fn keep(&mut self, item: &PlanItem, dst: PathBuf) -> Result<(), SyncError> {
        if item.strategy == Strategy::Merge && self.template_root.join(&item.path).exists() {
            if let Rendered::Text(text) = self.render(&item.path)? {
                self.baseline.record(&item.path, text);
            }
        }
        tracing::debug!("keep: {}", dst.display());
        self.results.push(ApplyResult::Kept { path: dst });
        Ok(())
    }

    fn write_template(&mut self, item: &PlanItem, dst: PathBuf) -> Result<(), SyncError> {
        let rendered = self.render(&item.path)?;
        let existing = if dst.exists() {
            Some(std::fs::read(&dst).map_err(|e| io_err(&dst, e))?)
        } else {
            None
        };

        let content = match (&rendered, existing.as_deref().map(std::str::from_utf8)) {
            (Rendered::Text(text), Some(Ok(ours))) => {
                let (guarded, report) = enforce_ours_blocks(ours, text);
                if !report.warnings.is_empty() {
                    self.warnings.push(ApplyWarning::BlocksReinserted {
                        path: item.path.clone(),
                        ids: report.warnings,
                    });
                }
                guarded.into_bytes()
            }
            _ => rendered.as_bytes().to_vec(),
        };

        if item.strategy == Strategy::Merge {
            if let Rendered::Text(text) = &rendered {
                self.baseline.record(&item.path, text.clone());
            }
        }

        if existing.as_deref() == Some(content.as_slice()) {
            tracing::debug!("unchanged: {}", dst.display());
            self.results.push(ApplyResult::Unchanged { path: dst });
            return Ok(());
        }

        self.files_changed += 1;
        if self.dry_run {
            self.would_apply(dst, item.action);
            return Ok(());
        }

        let src = self.template_root.join(&item.path);
        atomic_write(&dst, &content, Some(&src))?;
        tracing::info!("wrote: {}", dst.display());
        self.results.push(if existing.is_some() {
            ApplyResult::Overwritten { path: dst }
        } else {
            ApplyResult::Created { path: dst }
        });
        Ok(())
    }

    fn edit(&mut self, item: &PlanItem, dst: PathBuf) -> Result<(), SyncError> {
        let rendered = self.render(&item.path)?;
        let local = read_text_if_exists(&dst)?;
        let (Rendered::Text(theirs), Some(ours)) = (rendered, local) else {
            tracing::warn!("binary file cannot be merged, keeping local: {}", dst.display());
            self.warnings.push(ApplyWarning::BinaryMerge {
                path: item.path.clone(),
            });
            self.results.push(ApplyResult::BinarySkipped { path: dst });
            return Ok(());
        };

        let outcome = match self.baseline.get(&item.path) {
            Some(base) => merge3(base, &ours, &theirs),
            None => merge(&ours, &theirs),
        };
        let (text, report) = enforce_ours_blocks(&ours, &outcome.text);
        if !report.warnings.is_empty() {
            self.warnings.push(ApplyWarning::BlocksReinserted {
                path: item.path.clone(),
                ids: report.warnings,
            });
        }
        self.baseline.record(&item.path, theirs);

        self.files_changed += 1;
        self.conflicts_resolved += 1;
        if self.dry_run {
            self.would_apply(dst, Action::Edit);
            return Ok(());
        }

        atomic_write(&dst, text.as_bytes(), None)?;
        if outcome.had_conflict {
            tracing::warn!("merged with conflicts: {}", dst.display());
        } else {
            tracing::info!("merged: {}", dst.display());
        }
        self.results.push(ApplyResult::Merged {
            path: dst,
            conflicted: outcome.had_conflict,
        });
        Ok(())
    }

    fn delete(&mut self, item: &PlanItem, dst: PathBuf) -> Result<(), SyncError> {
        self.baseline.forget(&item.path);
        self.files_changed += 1;
        if self.dry_run {
            self.would_apply(dst, Action::Delete);
            return Ok(());
        }

        match std::fs::remove_file(&dst) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&dst, e)),
        }
        prune_empty_dirs(dst.parent(), self.repo_root);
        tracing::info!("deleted: {}", dst.display());
        self.results.push(ApplyResult::Deleted { path: dst });
        Ok(())
    }

    fn orphan(&mut self, item: &PlanItem, dst: PathBuf) -> Result<(), SyncError> {
        self.baseline.forget(&item.path);
        self.conflicts_resolved += 1;
        if self.dry_run {
            self.would_apply(dst, Action::Orphan);
            return Ok(());
        }

        let renamed_to = orphan_path(&dst);
        std::fs::rename(&dst, &renamed_to).map_err(|e| io_err(&dst, e))?;
        tracing::info!("orphaned: {} -> {}", dst.display(), renamed_to.display());
        self.results.push(ApplyResult::Orphaned {
            path: dst,
            renamed_to,
        });
        Ok(())
    }
}

/// Carry out `plan` against `repo_root`, rendering from `template`.
///
/// In dry-run mode nothing is written; results report
/// [`ApplyResult::WouldApply`] and the updated lock record is returned
/// without being persisted.
pub fn apply_plan(
    lock: &LockRecord,
    repo_root: &Path,
    template: &ResolvedTemplate,
    plan: &Plan,
    dry_run: bool,
) -> Result<ApplyOutcome, SyncError> {
    let started_at = Utc::now();
    let mut exec = Executor {
        repo_root,
        template_root: &template.root,
        renderer: Renderer::new(lock.render_rules())?,
        baseline: baseline::load_at(repo_root)?,
        dry_run,
        files_changed: 0,
        conflicts_resolved: 0,
        results: Vec::new(),
        warnings: Vec::new(),
    };

    for item in &plan.items {
        exec.run(item)?;
    }

    let updated_lock = lock.advanced_to(template);
    if !dry_run {
        if let Err(e) = lockfile::save_at(repo_root, &updated_lock) {
            tracing::warn!("failed to persist lock record: {e}");
            exec.warnings.push(ApplyWarning::LockNotPersisted {
                reason: e.to_string(),
            });
        }
        exec.baseline.recorded_at = started_at;
        if let Err(e) = baseline::save_at(repo_root, &exec.baseline) {
            tracing::warn!("failed to persist baseline: {e}");
            exec.warnings.push(ApplyWarning::BaselineNotPersisted {
                reason: e.to_string(),
            });
        }
    }

    Ok(ApplyOutcome {
        files_changed: exec.files_changed,
        conflicts_resolved: exec.conflicts_resolved,
        updated_lock,
        results: exec.results,
        warnings: exec.warnings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
