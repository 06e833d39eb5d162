//! Baseline store: the rendered template content last applied to each
//! merge-strategy file.
//!
//! Persists a [`Baseline`] JSON document at `<repo>/.ratsync/baseline.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the lock record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};
use crate::tree::STATE_DIR;

pub const BASELINE_FILE_NAME: &str = "baseline.json";

/// On-disk baseline payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Baseline {
    pub recorded_at: DateTime<Utc>,
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct BaselineCompat {
    recorded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    files: BTreeMap<String, String>,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            recorded_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }
}

impl Baseline {
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn record(&mut self, path: &str, content: impl Into<String>) {
        self.files.insert(path.to_owned(), content.into());
    }

    pub fn forget(&mut self, path: &str) {
        self.files.remove(path);
    }
}

/// `<repo>/.ratsync/baseline.json`
pub fn baseline_path_at(repo_root: &Path) -> PathBuf {
    repo_root.join(STATE_DIR).join(BASELINE_FILE_NAME)
}

/// Load the baseline. Returns an empty baseline if the file does not exist.
pub fn load_at(repo_root: &Path) -> Result<Baseline, SyncError> {
    let path = baseline_path_at(repo_root);
    if !path.exists() {
        return Ok(Baseline::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let raw: BaselineCompat = serde_json::from_str(&contents)?;
    Ok(Baseline {
        recorded_at: raw.recorded_at.unwrap_or_else(Utc::now),
        files: raw.files,
    })
}

/// Save the baseline atomically: `<path>.tmp` then rename.
pub fn save_at(repo_root: &Path, baseline: &Baseline) -> Result<(), SyncError> {
    let path = baseline_path_at(repo_root);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid baseline path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(baseline)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_baseline_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(load_at(tmp.path()).unwrap().files.is_empty());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut baseline = Baseline::default();
        baseline.record("README.md", "# Project\n");
        baseline.record(".github/workflows/ci.yml", "on: push\n");
        save_at(tmp.path(), &baseline).unwrap();

        let loaded = load_at(tmp.path()).unwrap();
        assert_eq!(loaded.files, baseline.files);
        assert_eq!(loaded.get("README.md"), Some("# Project\n"));
        assert!(
            !baseline_path_at(tmp.path()).with_extension("json.tmp").exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn forget_drops_entry() {
        let mut baseline = Baseline::default();
        baseline.record("a", "1");
        baseline.forget("a");
        assert_eq!(baseline.get("a"), None);
    }

    #[test]
    fn load_without_recorded_at_sets_timestamp() {
        let tmp = TempDir::new().unwrap();
        let path = baseline_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"files":{"a.txt":"x\n"}}"#).unwrap();

        let before = Utc::now();
        let loaded = load_at(tmp.path()).unwrap();
        assert_eq!(loaded.get("a.txt"), Some("x\n"));
        assert!(loaded.recorded_at >= before);
    }

    #[test]
    fn corrupt_baseline_is_a_json_error() {
        let tmp = TempDir::new().unwrap();
        let path = baseline_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_at(tmp.path()), Err(SyncError::Json(_))));
    }
}
