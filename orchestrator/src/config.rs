//! Suite configuration.
//!
//! Every field is optional; whatever a file leaves out falls back to the
//! project's standard layout.
//!
//! # Example YAML
//!
//! ```yaml
//! coverage: true
//! backend:
//!   dir: backend
//!   command: [venv/bin/python, -m, pytest, -x]
//! frontend-unit:
//!   command: [npm, test, --, --coverage]
//! frontend-e2e:
//!   dir: frontend
//!   command: [npx, playwright, test]
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use suite_runner_core::Suite;

use crate::error::Result;

/// Arguments that make pytest collect branch coverage without printing the
/// plugin's own report.
pub const PYTEST_COVERAGE_ARGS: [&str; 3] = ["--cov=.", "--cov-branch", "--cov-report="];

/// Overrides for one suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteSection {
    /// Working directory, relative to the repository root.
    pub dir: Option<PathBuf>,
    /// Argument vector to execute.
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SuitesConfig {
    /// Collect and report coverage.
    pub coverage: bool,
    pub backend: SuiteSection,
    pub frontend_unit: SuiteSection,
    pub frontend_e2e: SuiteSection,
}

impl Default for SuitesConfig {
    fn default() -> Self {
        Self {
            coverage: true,
            backend: SuiteSection::default(),
            frontend_unit: SuiteSection::default(),
            frontend_e2e: SuiteSection::default(),
        }
    }
}

/// Fully resolved invocation of one suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteCommand {
    pub dir: PathBuf,
    pub command: Vec<String>,
}

impl SuitesConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::OrchestratorError::IoError) if the file
    /// cannot be read, or [`Config`](crate::OrchestratorError::Config) if it
    /// is not valid YAML for this schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    fn section(&self, suite: Suite) -> &SuiteSection {
        match suite {
            Suite::Backend => &self.backend,
            Suite::FrontendUnit => &self.frontend_unit,
            Suite::FrontendE2e => &self.frontend_e2e,
        }
    }

    /// Working directory of `suite` under `repo_root`.
    pub fn suite_dir(&self, suite: Suite, repo_root: &Path) -> PathBuf {
        let dir = self
            .section(suite)
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_dir(suite)));
        repo_root.join(dir)
    }

    /// Resolves the directory and argument vector for `suite`.
    ///
    /// With coverage enabled the backend command also gets
    /// [`PYTEST_COVERAGE_ARGS`], unless it already passes a `--cov` option.
    pub fn resolve(&self, suite: Suite, repo_root: &Path) -> SuiteCommand {
        let dir = self.suite_dir(suite, repo_root);
        let mut command = self
            .section(suite)
            .command
            .clone()
            .filter(|command| !command.is_empty())
            .unwrap_or_else(|| default_command(suite, &dir));
        if suite == Suite::Backend
            && self.coverage
            && !command.iter().any(|arg| arg.starts_with("--cov"))
        {
            command.extend(PYTEST_COVERAGE_ARGS.iter().map(|arg| arg.to_string()));
        }
        SuiteCommand { dir, command }
    }
}

fn default_dir(suite: Suite) -> &'static str {
    match suite {
        Suite::Backend => "backend",
        Suite::FrontendUnit | Suite::FrontendE2e => "frontend",
    }
}

fn default_command(suite: Suite, dir: &Path) -> Vec<String> {
    let args = |args: &[&str]| args.iter().map(|arg| arg.to_string()).collect();
    match suite {
        Suite::Backend => vec![
            backend_python(dir).display().to_string(),
            "-m".to_string(),
            "pytest".to_string(),
        ],
        Suite::FrontendUnit => args(&["npm", "test", "--", "--coverage"]),
        Suite::FrontendE2e => args(&["npm", "run", "e2e"]),
    }
}

/// The backend's virtualenv interpreter when present, else `python3`.
pub fn backend_python(backend_dir: &Path) -> PathBuf {
    let venv_python = backend_dir.join("venv").join("bin").join("python");
    if venv_python.exists() {
        venv_python
    } else {
        PathBuf::from("python3")
    }
}
