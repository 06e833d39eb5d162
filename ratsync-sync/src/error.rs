//! Error types for ratsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use ratsync_core::{ConfigError, LockError};
use ratsync_renderer::RenderError;

/// All errors that can arise from plan, apply and adoption.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error reading, writing or validating the lock record.
    #[error("lock record error: {0}")]
    Lock(#[from] LockError),

    /// A malformed rule, glob or template reference.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A render rule that failed to compile.
    #[error("configuration error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template locator cannot be turned into a local tree.
    #[error("cannot resolve template '{locator}': {reason}")]
    UnresolvableTemplate { locator: String, reason: String },

    /// JSON serialization/deserialization error (baseline store).
    #[error("baseline JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// True for errors caused by bad rules or references rather than the
    /// filesystem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_) | SyncError::Render(_) | SyncError::Lock(LockError::Config(_))
        )
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
