//! Error types for ratsync-renderer.

use thiserror::Error;

/// All errors that can arise while compiling render rules.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A non-literal render rule whose pattern is not a valid regex.
    #[error("invalid render rule regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
