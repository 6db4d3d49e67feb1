//! Runs the project's test suites and keeps the resume summary current.
//!
//! - [`step`] executes one command, teeing its output to a log.
//! - [`config`] resolves each suite's directory and command.
//! - [`suites`] binds suites to commands and coverage readers.
//! - [`orchestrator`] plans a run, executes it sequentially or on a worker
//!   pool, writes the summary and prints the final report.
//!
//! # Example
//!
//! ```no_run
//! use suite_runner_coverage::terminal::Palette;
//! use suite_runner_orchestrator::{ProjectSuites, RunConfig, SuitesConfig, run};
//!
//! let config = RunConfig { parallel: true, ..RunConfig::new(".") };
//! let suites = ProjectSuites::new(".", SuitesConfig::default(), Palette::PLAIN);
//! let code = run(&config, &suites, &mut std::io::stdout()).unwrap();
//! std::process::exit(code);
//! ```

pub mod config;
mod error;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod step;
pub mod suites;

pub use config::SuitesConfig;
pub use error::{OrchestratorError, Result};
pub use orchestrator::{
    ALL_PASSED_MESSAGE, ExecutionMode, ExecutionPlan, PARALLEL_WORKERS, Plan, RunConfig, execute,
    plan_run, run, run_with_progress,
};
pub use progress::{LiveProgress, NoProgress, Progress};
pub use suites::{ProjectSuites, SuiteOptions, SuiteRunner};
