//! Core result types and the resume store for multi-suite test runs.
//!
//! This crate defines what every other member of the workspace passes
//! around:
//!
//! - [`Suite`]: one of the three fixed test suites, in canonical order.
//! - [`StepStatus`]: the outcome class of one executed command.
//! - [`StepResult`]: the immutable record of one suite execution.
//! - [`resume`]: the persisted JSON summary of the last run, used to decide
//!   which suites a `--resume` invocation has to re-run.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use suite_runner_core::{StepResult, StepStatus, Suite};
//!
//! let result = StepResult::completed(
//!     Suite::Backend.name(),
//!     vec!["pytest".into(), "-q".into()],
//!     0,
//!     Duration::from_millis(1500),
//!     Vec::new(),
//!     None,
//! );
//! assert_eq!(result.status, StepStatus::Ok);
//! assert!(result.is_ok());
//! ```

mod error;
pub mod resume;
mod types;

pub use error::{ResumeError, Result};
pub use types::*;
