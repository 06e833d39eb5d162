//! Error types for ratsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed rule, pattern or template reference.
///
/// Raised while a lock record or its rules are constructed or compiled,
/// never in the middle of an apply pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A managed rule path was empty after normalization.
    #[error("managed path cannot be empty")]
    EmptyPath,

    /// A strategy name outside `enforce`, `preserve`, `merge`.
    #[error("unknown strategy '{0}'; expected: enforce, preserve, merge")]
    UnknownStrategy(String),

    /// A render rule with an empty pattern.
    #[error("render rule pattern cannot be empty")]
    EmptyRenderPattern,

    /// A template reference not of the form `rat:<locator>@<ref>`.
    #[error("malformed template reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    /// A repository locator that is neither remote nor a local path.
    #[error(
        "unsupported template locator '{0}'; expected gh:<org>/<repo>, local:<path>, \
         or a path starting with '/', './' or '../'"
    )]
    MalformedLocator(String),

    /// A glob that could not be compiled.
    #[error("invalid glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },
}

/// Errors from reading or writing the lock record.
#[derive(Debug, Error)]
pub enum LockError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse or validation error on load, with the file path.
    #[error("failed to parse lock record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No lock record exists yet; the repository must be adopted first.
    #[error("no lock record at {path}; run `ratsync adopt` first")]
    NotAdopted { path: PathBuf },

    /// Adoption was requested for a repository that already has a lock record.
    #[error("repository already adopted: lock record exists at {path}")]
    AlreadyAdopted { path: PathBuf },

    /// The record carries an invalid rule or reference.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience constructor for [`LockError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> LockError {
    LockError::Io {
        path: path.into(),
        source,
    }
}
