//! Directory tree scanning for repositories and template snapshots.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::{DirEntry, WalkDir};

use ratsync_core::lockfile::LOCK_FILE_NAME;

use crate::error::{io_err, SyncError};

/// Per-repository state directory (baseline snapshots).
pub const STATE_DIR: &str = ".ratsync";

/// Suffix of in-flight atomic writes.
pub const TMP_SUFFIX: &str = ".ratsync.tmp";

/// Relative posix paths of every regular file under a root.
///
/// Skips `.git/`, the lock file, the state directory and in-flight
/// temporary files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTree {
    root: PathBuf,
    paths: BTreeSet<String>,
}

fn is_bookkeeping(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        return name == ".git" || (entry.depth() == 1 && name == STATE_DIR);
    }
    (entry.depth() == 1 && name == LOCK_FILE_NAME) || name.ends_with(TMP_SUFFIX)
}

fn posix_relative(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

impl FileTree {
    /// Walk `root`. A missing root is an empty tree.
    pub fn scan(root: &Path) -> Result<Self, SyncError> {
        let mut paths = BTreeSet::new();
        if !root.exists() {
            return Ok(Self {
                root: root.to_path_buf(),
                paths,
            });
        }
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_bookkeeping(e));
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                io_err(path, e.into())
            })?;
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }
            if let Some(rel) = posix_relative(entry.path(), root) {
                paths.insert(rel);
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            paths,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &BTreeSet<String> {
        &self.paths
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.paths.contains(rel)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Absolute path of a relative entry.
    pub fn abs(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn read_bytes(&self, rel: &str) -> Result<Vec<u8>, SyncError> {
        let path = self.abs(rel);
        std::fs::read(&path).map_err(|e| io_err(path, e))
    }

    /// Content as text, or `None` when it is not valid UTF-8.
    pub fn read_text(&self, rel: &str) -> Result<Option<String>, SyncError> {
        Ok(String::from_utf8(self.read_bytes(rel)?).ok())
    }
}

/// Read `path` as text; `Ok(None)` when it is missing or not UTF-8.
pub fn read_text_if_exists(path: &Path) -> Result<Option<String>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8(bytes).ok()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// SHA-256 over sorted paths and contents of `tree`, hex encoded.
pub fn tree_digest(tree: &FileTree) -> Result<String, SyncError> {
    let mut hasher = Sha256::new();
    for rel in tree.paths() {
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        hasher.update(tree.read_bytes(rel)?);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}
