//! Error types for resume store operations.

use thiserror::Error;

/// Errors that can occur while loading or writing a resume summary.
#[derive(Debug, Error)]
pub enum ResumeError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The summary file exists but is not valid JSON.
    #[error("malformed resume summary: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The summary parsed as JSON but is not an object.
    #[error("malformed resume summary: {0}")]
    Malformed(String),

    /// Atomic replacement of the summary file failed.
    #[error("failed to persist resume summary: {0}")]
    PersistError(#[from] tempfile::PersistError),
}

/// Convenience alias for results with [`ResumeError`].
pub type Result<T> = std::result::Result<T, ResumeError>;
