//! Lock record persistence.
//!
//! # Storage layout
//!
//! ```text
//! <repo>/
//!   .ratsync.lock        (YAML lock record)
//!   .ratsync.lock.tmp    (only while a save is in flight)
//! ```
//!
//! Saves serialize to a `.tmp` sibling and rename it over the target, so a
//! crash mid-write leaves the previous record intact.

use std::path::{Path, PathBuf};

use crate::error::{io_err, LockError};
use crate::types::LockRecord;

/// File name of the lock record at the repository root.
pub const LOCK_FILE_NAME: &str = ".ratsync.lock";

/// `<repo>/.ratsync.lock`: pure, no I/O.
pub fn lock_path_at(repo_root: &Path) -> PathBuf {
    repo_root.join(LOCK_FILE_NAME)
}

/// True when the repository has been adopted.
pub fn exists_at(repo_root: &Path) -> bool {
    lock_path_at(repo_root).is_file()
}

/// Load the lock record of `repo_root`.
///
/// Returns [`LockError::NotAdopted`] if absent and [`LockError::Parse`]
/// (with path and line context) if the YAML or its rules are malformed.
pub fn load_at(repo_root: &Path) -> Result<LockRecord, LockError> {
    let path = lock_path_at(repo_root);
    if !path.exists() {
        return Err(LockError::NotAdopted { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| LockError::Parse { path, source })
}

/// Atomically save `record` as the lock record of `repo_root`.
///
/// Write flow: serialize → `.ratsync.lock.tmp` sibling → `rename`.
pub fn save_at(repo_root: &Path, record: &LockRecord) -> Result<(), LockError> {
    let path = lock_path_at(repo_root);
    let tmp = path.with_file_name(format!("{LOCK_FILE_NAME}.tmp"));

    let yaml = serde_yaml::to_string(record)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

/// Save `record` only if no lock record exists yet.
pub fn create_at(repo_root: &Path, record: &LockRecord) -> Result<(), LockError> {
    let path = lock_path_at(repo_root);
    if path.exists() {
        return Err(LockError::AlreadyAdopted { path });
    }
    save_at(repo_root, record)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
