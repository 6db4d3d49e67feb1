//! Error types for coverage reading and reporting.

use thiserror::Error;

/// Errors raised while producing or reading coverage artifacts.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A coverage artifact is not valid JSON of the expected shape.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The coverage engine could not produce the requested output.
    #[error("coverage engine failed: {0}")]
    Engine(String),
}

/// Convenience alias for results with [`CoverageError`].
pub type Result<T> = std::result::Result<T, CoverageError>;
