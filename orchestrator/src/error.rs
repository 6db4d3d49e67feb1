//! Error types for orchestrated runs.
//!
//! Suite failures are not errors: they are recorded in a
//! [`StepResult`](suite_runner_core::StepResult). An [`OrchestratorError`]
//! means the run itself could not proceed.

use thiserror::Error;

use suite_runner_core::ResumeError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The resume summary could not be loaded or written.
    #[error(transparent)]
    Resume(#[from] ResumeError),

    /// The suite configuration file is not valid YAML.
    #[error("invalid suite configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// The parallel worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience alias for results with [`OrchestratorError`].
pub type Result<T> = std::result::Result<T, OrchestratorError>;
