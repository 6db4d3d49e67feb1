//! Seam over the statement/branch coverage database.
//!
//! The readers and the terminal reporter only ever talk to a
//! [`CoverageEngine`]. [`CoveragePy`] is the production implementation and
//! shells out to `python -m coverage`; tests substitute in-memory fakes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{CoverageError, Result};
use crate::filter::{OMIT_GLOBS, is_production};

/// File name of the coverage database inside the project root.
pub const DATA_FILE_NAME: &str = ".coverage";

/// Captured output of one engine subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Operations the coverage tooling needs from a coverage engine.
pub trait CoverageEngine: Send + Sync {
    /// Location of the coverage database.
    fn data_file(&self) -> &Path;

    /// Writes a JSON report to `outfile`, leaving out files matching `omit`.
    fn json_report(&self, outfile: &Path, omit: &[&str], ignore_errors: bool) -> Result<()>;

    /// The engine's own plain-text summary table.
    fn text_report(&self) -> Result<String>;

    /// Deletes collected data.
    ///
    /// `Err` means the engine could not be started; a started engine that
    /// fails reports it through [`CommandOutput::code`].
    fn erase(&self) -> Result<CommandOutput>;
}

/// [`CoverageEngine`] backed by coverage.py.
#[derive(Debug, Clone)]
pub struct CoveragePy {
    python: PathBuf,
    root: PathBuf,
    data_file: PathBuf,
}

impl CoveragePy {
    /// Engine for the project at `root`, invoking `python -m coverage`.
    pub fn new(python: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            python: python.into(),
            data_file: root.join(DATA_FILE_NAME),
            root,
        }
    }

    fn run(&self, args: &[String]) -> Result<CommandOutput> {
        debug!(python = %self.python.display(), ?args, "Running coverage engine");
        let output = Command::new(&self.python)
            .args(["-m", "coverage"])
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                CoverageError::Engine(format!(
                    "failed to start '{}': {err}",
                    self.python.display()
                ))
            })?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn data_file_arg(&self) -> String {
        format!("--data-file={}", self.data_file.display())
    }
}

impl CoverageEngine for CoveragePy {
    fn data_file(&self) -> &Path {
        &self.data_file
    }

    fn json_report(&self, outfile: &Path, omit: &[&str], ignore_errors: bool) -> Result<()> {
        let mut args = vec![
            "json".to_string(),
            self.data_file_arg(),
            "-o".to_string(),
            outfile.display().to_string(),
        ];
        if !omit.is_empty() {
            args.push(format!("--omit={}", omit.join(",")));
        }
        if ignore_errors {
            args.push("--ignore-errors".to_string());
        }
        let output = self.run(&args)?;
        if output.success() {
            Ok(())
        } else {
            Err(CoverageError::Engine(format!(
                "json report exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            )))
        }
    }

    fn text_report(&self) -> Result<String> {
        let output = self.run(&["report".to_string(), self.data_file_arg()])?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(CoverageError::Engine(format!(
                "text report exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            )))
        }
    }

    fn erase(&self) -> Result<CommandOutput> {
        self.run(&["erase".to_string(), self.data_file_arg()])
    }
}

/// Structured report produced by [`CoverageEngine::json_report`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverageReport {
    /// Whole-run totals, kept untyped so each field can be checked on its own.
    #[serde(default)]
    pub totals: Option<Value>,
    #[serde(default)]
    pub files: BTreeMap<String, FileCoverage>,
}

/// Per-file section of a [`CoverageReport`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileCoverage {
    #[serde(default)]
    pub summary: FileSummary,
    #[serde(default)]
    pub executed_lines: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FileSummary {
    #[serde(default)]
    pub num_statements: i64,
    #[serde(default)]
    pub missing_lines: i64,
}

impl FileSummary {
    /// Share of statements executed; 100% for a file without statements.
    pub fn percent_covered(&self) -> f64 {
        if self.num_statements > 0 {
            (self.num_statements - self.missing_lines) as f64 / self.num_statements as f64 * 100.0
        } else {
            100.0
        }
    }
}

impl CoverageReport {
    /// Files that pass [`is_production`], in path order.
    pub fn production_files(&self) -> impl Iterator<Item = (&str, &FileCoverage)> {
        self.files
            .iter()
            .filter(|(path, _)| is_production(path.as_str()))
            .map(|(path, file)| (path.as_str(), file))
    }
}

/// Generates and parses a production-only JSON report.
///
/// Returns `Ok(None)` when the engine has no database to report on.
pub fn load_report(engine: &dyn CoverageEngine) -> Result<Option<CoverageReport>> {
    if !engine.data_file().exists() {
        debug!(data_file = %engine.data_file().display(), "No coverage database");
        return Ok(None);
    }
    let outfile = tempfile::Builder::new()
        .prefix("coverage-")
        .suffix(".json")
        .tempfile()?;
    engine.json_report(outfile.path(), OMIT_GLOBS, true)?;
    let raw = fs::read_to_string(outfile.path())?;
    Ok(Some(serde_json::from_str(&raw)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_percent_follows_statements() {
        let summary = FileSummary {
            num_statements: 8,
            missing_lines: 2,
        };
        assert_eq!(summary.percent_covered(), 75.0);
        assert_eq!(FileSummary::default().percent_covered(), 100.0);
    }

    #[test]
    fn test_report_parses_coverage_py_shape() {
        let raw = r#"{
            "meta": {"version": "7.6.1"},
            "totals": {"num_statements": 12, "missing_lines": 3, "percent_covered": 75.0},
            "files": {
                "app/views.py": {
                    "executed_lines": [1, 2, 5],
                    "summary": {"num_statements": 10, "missing_lines": 3, "percent_covered": 70.0}
                },
                "app/tests/test_views.py": {
                    "summary": {"num_statements": 2, "missing_lines": 0, "percent_covered": 100.0}
                }
            }
        }"#;
        let report: CoverageReport = serde_json::from_str(raw).unwrap();

        let production: Vec<&str> = report.production_files().map(|(path, _)| path).collect();
        assert_eq!(production, vec!["app/views.py"]);
        assert_eq!(report.files["app/views.py"].executed_lines, vec![1, 2, 5]);
        assert!(report.totals.is_some());
    }

    #[test]
    fn test_load_report_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CoveragePy::new("python3", dir.path());
        assert!(load_report(&engine).unwrap().is_none());
    }
}
