//! Per-suite execution: the backend, frontend unit and end-to-end runners.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use suite_runner_core::{StepResult, StepStatus, Suite};
use suite_runner_coverage::backend::backend_coverage_summary;
use suite_runner_coverage::flow::flow_coverage_summary;
use suite_runner_coverage::terminal::{
    COVERAGE_PLUGIN_HOOK, CoverageReporter, Palette, TerminalSummaryHooks, engine_summary_hook,
};
use suite_runner_coverage::unit::unit_coverage_summary;
use suite_runner_coverage::{CoverageEngine, CoveragePy};

use crate::config::{SuitesConfig, backend_python};
use crate::step::{StepRequest, build_log_header, run_command};

/// Per-run settings shared by every suite invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteOptions {
    pub run_id: String,
    pub log_path: Option<PathBuf>,
    pub append_log: bool,
    pub quiet: bool,
}

/// Executes one suite and reports its result.
///
/// Implementations must not return early on suite failure; every outcome is
/// a [`StepResult`].
pub trait SuiteRunner: Sync {
    fn run(&self, suite: Suite, options: &SuiteOptions) -> StepResult;
}

/// The project's real suites, as described by a [`SuitesConfig`].
pub struct ProjectSuites {
    repo_root: PathBuf,
    config: SuitesConfig,
    engine: Arc<dyn CoverageEngine>,
    palette: Palette,
}

impl ProjectSuites {
    /// Suites under `repo_root`, reading backend coverage through
    /// coverage.py in the backend directory.
    pub fn new(repo_root: impl Into<PathBuf>, config: SuitesConfig, palette: Palette) -> Self {
        let repo_root = repo_root.into();
        let backend_dir = config.suite_dir(Suite::Backend, &repo_root);
        let engine = Arc::new(CoveragePy::new(backend_python(&backend_dir), backend_dir));
        Self {
            repo_root,
            config,
            engine,
            palette,
        }
    }

    /// Replaces the backend coverage engine.
    pub fn with_engine(mut self, engine: Arc<dyn CoverageEngine>) -> Self {
        self.engine = engine;
        self
    }

    fn run_backend(&self, request: &StepRequest) -> StepResult {
        if self.config.coverage {
            erase_coverage(self.engine.as_ref());
        }
        let result = run_command(request);
        if !self.config.coverage || result.status == StepStatus::Error {
            return result;
        }

        let report = self.session_summary(&request.cwd);
        if !report.is_empty() {
            append_to_log(request, &report);
            if !request.quiet {
                print!("{report}");
                let _ = io::stdout().flush();
            }
        }
        result
            .with_extra_output(report.lines().map(str::to_string))
            .with_coverage(guarded_coverage(Suite::Backend, || {
                backend_coverage_summary(self.engine.as_ref(), &request.cwd)
            }))
    }

    /// Text emitted by the end-of-session summary hooks.
    fn session_summary(&self, backend_dir: &Path) -> String {
        let mut hooks = TerminalSummaryHooks::new();
        hooks.register(COVERAGE_PLUGIN_HOOK, engine_summary_hook(self.engine.clone()));
        CoverageReporter::new(self.engine.clone(), backend_dir, self.palette).install(&mut hooks);

        let mut out = Vec::new();
        if let Err(err) = hooks.emit(&mut out) {
            debug!(error = %err, "Session summary hook failed");
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

impl SuiteRunner for ProjectSuites {
    fn run(&self, suite: Suite, options: &SuiteOptions) -> StepResult {
        let resolved = self.config.resolve(suite, &self.repo_root);
        let request = StepRequest {
            name: suite.name().to_string(),
            log_header: Some(build_log_header(&options.run_id, suite.name(), &resolved.command)),
            command: resolved.command,
            cwd: resolved.dir,
            log_path: options.log_path.clone(),
            append_log: options.append_log,
            quiet: options.quiet,
        };

        match suite {
            Suite::Backend => self.run_backend(&request),
            Suite::FrontendUnit => {
                let result = run_command(&request);
                if self.config.coverage {
                    let coverage = guarded_coverage(suite, || unit_coverage_summary(&request.cwd));
                    result.with_coverage(coverage)
                } else {
                    result
                }
            }
            Suite::FrontendE2e => {
                let result = run_command(&request);
                let coverage = guarded_coverage(suite, || flow_coverage_summary(&request.cwd));
                result.with_coverage(coverage)
            }
        }
    }
}

/// Clears stale backend coverage data. Failure is reported and ignored.
pub fn erase_coverage(engine: &dyn CoverageEngine) {
    match engine.erase() {
        Ok(output) if output.success() => debug!("Erased coverage data"),
        Ok(output) => {
            warn!(code = ?output.code, "Coverage erase failed, continuing");
            eprintln!("warning: coverage erase exited with {:?}", output.code);
            if !output.stdout.trim().is_empty() {
                eprintln!("{}", output.stdout.trim_end());
            }
            if !output.stderr.trim().is_empty() {
                eprintln!("{}", output.stderr.trim_end());
            }
        }
        Err(err) => {
            warn!(error = %err, "Coverage erase could not run, continuing");
            eprintln!("warning: coverage erase could not run: {err}");
        }
    }
}

/// Runs a coverage reader, treating a panic as "no coverage" so reporting
/// never changes a suite's outcome.
fn guarded_coverage(suite: Suite, read: impl FnOnce() -> Vec<String>) -> Vec<String> {
    catch_unwind(AssertUnwindSafe(read)).unwrap_or_else(|_| {
        warn!(suite = suite.name(), "Coverage reader panicked, reporting no coverage");
        Vec::new()
    })
}

fn append_to_log(request: &StepRequest, text: &str) {
    let Some(path) = request.log_path.as_deref() else {
        return;
    };
    let written = OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(text.as_bytes()));
    if let Err(err) = written {
        warn!(path = %path.display(), error = %err, "Failed to append coverage report to log");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    use suite_runner_coverage::{CommandOutput, CoverageError};

    use crate::config::SuiteSection;

    #[derive(Default)]
    struct FakeEngine {
        data_file: PathBuf,
        report: Option<String>,
        erase_code: Option<i32>,
        erased: Mutex<usize>,
        panic_on_report: bool,
    }

    impl CoverageEngine for FakeEngine {
        fn data_file(&self) -> &Path {
            &self.data_file
        }

        fn json_report(
            &self,
            outfile: &Path,
            _omit: &[&str],
            _ignore_errors: bool,
        ) -> suite_runner_coverage::Result<()> {
            if self.panic_on_report {
                panic!("report totals overflowed");
            }
            match &self.report {
                Some(report) => Ok(fs::write(outfile, report)?),
                None => Err(CoverageError::Engine("no data".to_string())),
            }
        }

        fn text_report(&self) -> suite_runner_coverage::Result<String> {
            Ok("PLUGIN TABLE\n".to_string())
        }

        fn erase(&self) -> suite_runner_coverage::Result<CommandOutput> {
            *self.erased.lock().unwrap() += 1;
            Ok(CommandOutput {
                code: self.erase_code,
                stdout: "erase stdout".to_string(),
                stderr: "erase stderr".to_string(),
            })
        }
    }

    fn sh(script: &str) -> SuiteSection {
        SuiteSection {
            dir: Some(PathBuf::from(".")),
            command: Some(vec!["sh".into(), "-c".into(), script.into()]),
        }
    }

    fn options(dir: &Path, name: &str) -> SuiteOptions {
        SuiteOptions {
            run_id: "run-1".to_string(),
            log_path: Some(dir.join(format!("reports/{name}.log"))),
            append_log: false,
            quiet: true,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_backend_appends_production_report() {
        let dir = tempfile::tempdir().unwrap();
        let data_file = dir.path().join(".coverage");
        fs::write(&data_file, b"").unwrap();
        let engine = Arc::new(FakeEngine {
            data_file,
            report: Some(
                r#"{"totals": {"num_statements": 10, "missing_lines": 2},
                    "files": {"app/views.py": {"summary": {"num_statements": 10, "missing_lines": 2}}}}"#
                    .to_string(),
            ),
            erase_code: Some(1),
            ..FakeEngine::default()
        });
        let config = SuitesConfig {
            backend: sh("echo collected 3 items"),
            ..SuitesConfig::default()
        };
        let suites = ProjectSuites::new(dir.path(), config, Palette::PLAIN).with_engine(engine.clone());

        let result = suites.run(Suite::Backend, &options(dir.path(), "backend"));

        assert_eq!(result.status, StepStatus::Ok);
        assert_eq!(*engine.erased.lock().unwrap(), 1);
        assert_eq!(
            result.coverage,
            vec![
                "Statements: 80.0% (8/10)",
                "Lines: 80.0% (8/10)",
                "Total: 80.0% (16/20)",
            ]
        );
        let log = fs::read_to_string(dir.path().join("reports/backend.log")).unwrap();
        assert!(log.contains("Suite: backend"));
        assert!(log.contains("collected 3 items"));
        assert!(log.contains("Coverage Report  (production files)"));
        assert!(!log.contains("PLUGIN TABLE"));
        assert!(result.output_tail.iter().any(|line| line.starts_with("TOTAL (combined)")));
    }

    #[cfg(unix)]
    #[test]
    fn test_backend_without_coverage_skips_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let config = SuitesConfig {
            coverage: false,
            backend: sh("exit 1"),
            ..SuitesConfig::default()
        };
        let suites = ProjectSuites::new(dir.path(), config, Palette::PLAIN).with_engine(engine.clone());

        let result = suites.run(Suite::Backend, &options(dir.path(), "backend"));

        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(*engine.erased.lock().unwrap(), 0);
        assert!(result.coverage.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_backend_coverage_panic_keeps_suite_ok() {
        let dir = tempfile::tempdir().unwrap();
        let data_file = dir.path().join(".coverage");
        fs::write(&data_file, b"").unwrap();
        let engine = Arc::new(FakeEngine {
            data_file,
            erase_code: Some(0),
            panic_on_report: true,
            ..FakeEngine::default()
        });
        let config = SuitesConfig {
            backend: sh("echo 1 passed"),
            ..SuitesConfig::default()
        };
        let suites = ProjectSuites::new(dir.path(), config, Palette::PLAIN).with_engine(engine);

        let result = suites.run(Suite::Backend, &options(dir.path(), "backend"));

        assert_eq!(result.status, StepStatus::Ok);
        assert_eq!(result.returncode, 0);
        assert!(result.coverage.is_empty());
    }

    #[test]
    fn test_guarded_coverage_recovers_from_panic() {
        let lines = guarded_coverage(Suite::FrontendE2e, || panic!("bad flow summary"));
        assert!(lines.is_empty());
        let lines = guarded_coverage(Suite::FrontendUnit, || vec!["Lines: 100.0% (1/1)".to_string()]);
        assert_eq!(lines, vec!["Lines: 100.0% (1/1)"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_frontend_suites_read_their_coverage() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("e2e-results")).unwrap();
        fs::write(
            dir.path().join("e2e-results/flow-coverage.json"),
            r#"{"summary": {"total": 4, "covered": 3, "partial": 1, "failing": 0, "missing": 0}}"#,
        )
        .unwrap();
        let config = SuitesConfig {
            frontend_unit: sh("true"),
            frontend_e2e: sh("true"),
            ..SuitesConfig::default()
        };
        let suites = ProjectSuites::new(dir.path(), config, Palette::PLAIN)
            .with_engine(Arc::new(FakeEngine::default()));

        let unit = suites.run(Suite::FrontendUnit, &options(dir.path(), "frontend-unit"));
        let e2e = suites.run(Suite::FrontendE2e, &options(dir.path(), "frontend-e2e"));

        assert!(unit.coverage.is_empty());
        assert_eq!(
            e2e.coverage,
            vec!["Flows covered: 3/4 (75.0%)", "Partial: 1", "Missing: 0"]
        );
    }
}
