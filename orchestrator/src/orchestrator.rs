//! Run planning, execution and the resume cycle.
//!
//! A run is planned once, up front: which suites execute, whether their logs
//! are appended, and whether output is echoed. Only then do suites start,
//! either one after another in canonical order or on a fixed pool of
//! [`PARALLEL_WORKERS`] threads. Results are always reported and persisted in
//! canonical order, whatever order they completed in.

use std::collections::BTreeMap;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};
use uuid::Uuid;

use suite_runner_core::resume::{self, RESUME_FILENAME, ResumeEntry};
use suite_runner_core::{EXIT_LAUNCH_FAILED, StepResult, Suite};

use crate::error::Result;
use crate::progress::{NoProgress, Progress};
use crate::report::print_final_report;
use crate::suites::{SuiteOptions, SuiteRunner};

/// Worker count of the parallel pool: one per suite.
pub const PARALLEL_WORKERS: usize = 3;

/// Printed when a resumed run finds nothing to do.
pub const ALL_PASSED_MESSAGE: &str = "All suites passed in the last run";

/// Name of the directory under the repository root that holds logs and the
/// resume summary by default.
pub const DEFAULT_REPORT_DIR: &str = "test-reports";

/// Options for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub parallel: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub resume: bool,
    pub repo_root: PathBuf,
    /// Holds the suite logs and the resume summary.
    pub report_dir: PathBuf,
}

impl RunConfig {
    /// Sequential, non-resumed run of the repository at `repo_root`.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            parallel: false,
            verbose: false,
            quiet: false,
            resume: false,
            report_dir: repo_root.join(DEFAULT_REPORT_DIR),
            repo_root,
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.report_dir.join(RESUME_FILENAME)
    }

    pub fn log_path(&self, suite: Suite) -> PathBuf {
        self.report_dir.join(format!("{}.log", suite.name()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel { workers: usize },
}

/// What a run will do once it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    /// Suites to execute, in canonical order.
    pub suites: Vec<Suite>,
    pub append_log: bool,
    pub quiet: bool,
    pub mode: ExecutionMode,
    /// Previous summary entries, carried forward for suites not re-run.
    pub existing_entries: Option<BTreeMap<String, ResumeEntry>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// A resumed run whose previous summary has every suite `ok`.
    AllPassed,
    Execute(ExecutionPlan),
}

/// Decides which suites run and how.
///
/// # Errors
///
/// Returns [`Resume`](crate::OrchestratorError::Resume) when a resume
/// summary exists but cannot be read or parsed.
pub fn plan_run(config: &RunConfig) -> Result<Plan> {
    let quiet = config.quiet || (config.parallel && !config.verbose);
    let mode = if config.parallel {
        ExecutionMode::Parallel {
            workers: PARALLEL_WORKERS,
        }
    } else {
        ExecutionMode::Sequential
    };
    let plan = |suites, append_log, existing_entries| {
        Plan::Execute(ExecutionPlan {
            suites,
            append_log,
            quiet,
            mode,
            existing_entries,
        })
    };

    if !config.resume {
        return Ok(plan(Suite::ALL.to_vec(), false, None));
    }
    let Some(summary) = resume::load(&config.summary_path())? else {
        info!("No previous run to resume, running all suites");
        return Ok(plan(Suite::ALL.to_vec(), true, None));
    };

    let entries = resume::extract_entries(&summary);
    let pending: Vec<Suite> = Suite::ALL
        .into_iter()
        .filter(|suite| resume::status_of(entries.get(suite.name())) != "ok")
        .collect();
    if pending.is_empty() {
        return Ok(Plan::AllPassed);
    }
    info!(suites = ?pending, "Resuming suites that did not pass");
    Ok(plan(pending, true, Some(entries)))
}

/// Runs the suites in `plan` and returns their results in plan order.
///
/// # Errors
///
/// Returns [`ThreadPool`](crate::OrchestratorError::ThreadPool) when the
/// parallel pool cannot be created. Suite failures, including panics inside
/// `runner`, are results, not errors.
pub fn execute(
    config: &RunConfig,
    plan: &ExecutionPlan,
    run_id: &str,
    runner: &dyn SuiteRunner,
    progress: &dyn Progress,
) -> Result<Vec<StepResult>> {
    let options_for = |suite: Suite| SuiteOptions {
        run_id: run_id.to_string(),
        log_path: Some(config.log_path(suite)),
        append_log: plan.append_log,
        quiet: plan.quiet,
    };

    match plan.mode {
        ExecutionMode::Sequential => Ok(plan
            .suites
            .iter()
            .map(|&suite| run_guarded(runner, suite, &options_for(suite)))
            .collect()),
        ExecutionMode::Parallel { workers } => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
            progress.start(&plan.suites);
            let results = pool.install(|| {
                plan.suites
                    .par_iter()
                    .map(|&suite| {
                        let result = run_guarded(runner, suite, &options_for(suite));
                        progress.mark_done(&result.name, result.status, result.duration);
                        result
                    })
                    .collect()
            });
            progress.finish();
            Ok(results)
        }
    }
}

/// Runs one suite, turning a panic in the runner into an `error` result.
fn run_guarded(runner: &dyn SuiteRunner, suite: Suite, options: &SuiteOptions) -> StepResult {
    let started = Instant::now();
    match catch_unwind(AssertUnwindSafe(|| runner.run(suite, options))) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(suite = suite.name(), panic = %detail, "Suite runner panicked");
            StepResult::launch_error(
                suite.name(),
                Vec::new(),
                EXIT_LAUNCH_FAILED,
                started.elapsed(),
                format!("suite runner panicked: {detail}"),
                options.log_path.clone(),
            )
        }
    }
}

/// Plans, executes, persists and reports a run without a progress display.
pub fn run(config: &RunConfig, runner: &dyn SuiteRunner, out: &mut dyn Write) -> Result<i32> {
    run_with_progress(config, runner, &NoProgress, out)
}

/// Plans, executes, persists and reports a run.
///
/// Returns the process exit code: 0 when every suite passed, 1 otherwise.
/// A resumed run with nothing left to do prints [`ALL_PASSED_MESSAGE`] and
/// returns 0 without touching the summary.
pub fn run_with_progress(
    config: &RunConfig,
    runner: &dyn SuiteRunner,
    progress: &dyn Progress,
    out: &mut dyn Write,
) -> Result<i32> {
    let plan = match plan_run(config)? {
        Plan::AllPassed => {
            writeln!(out, "{ALL_PASSED_MESSAGE}")?;
            return Ok(0);
        }
        Plan::Execute(plan) => plan,
    };

    let run_id = Uuid::new_v4().to_string();
    info!(run_id = %run_id, suites = ?plan.suites, mode = ?plan.mode, "Starting test run");
    let results = execute(config, &plan, &run_id, runner, progress)?;

    let summary = resume::build(
        &results,
        &run_id,
        &config.repo_root,
        &Suite::order(),
        plan.existing_entries.as_ref(),
    );
    resume::write(&config.summary_path(), &summary)?;

    let report = report_rows(results, plan.existing_entries.as_ref());
    print_final_report(out, &report, &config.repo_root)?;
    out.flush()?;

    Ok(if report.iter().all(StepResult::is_passing) { 0 } else { 1 })
}

/// Results in canonical order, with a skipped row for each suite carried
/// forward from the previous run.
fn report_rows(
    results: Vec<StepResult>,
    existing_entries: Option<&BTreeMap<String, ResumeEntry>>,
) -> Vec<StepResult> {
    let mut by_name: BTreeMap<String, StepResult> = results
        .into_iter()
        .map(|result| (result.name.clone(), result))
        .collect();
    Suite::ALL
        .into_iter()
        .filter_map(|suite| {
            by_name.remove(suite.name()).or_else(|| {
                existing_entries
                    .filter(|entries| entries.contains_key(suite.name()))
                    .map(|_| StepResult::skipped(suite.name()))
            })
        })
        .collect()
}
