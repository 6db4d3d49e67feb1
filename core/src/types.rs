//! Suite identifiers and per-execution result records.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Number of trailing output lines kept in [`StepResult::output_tail`].
pub const OUTPUT_TAIL_LINES: usize = 40;

/// Return code reported when the executable could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Return code reported when the executable could not be run.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Return code reported for any other launch failure.
pub const EXIT_LAUNCH_FAILED: i32 = 1;

/// One of the independently runnable test suites.
///
/// The declaration order is the canonical suite order used for sequential
/// execution, the final report, and the resume summary.
///
/// # Examples
///
/// ```
/// use suite_runner_core::Suite;
///
/// assert_eq!(Suite::ALL[0], Suite::Backend);
/// assert_eq!("frontend-e2e".parse::<Suite>().unwrap(), Suite::FrontendE2e);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suite {
    Backend,
    FrontendUnit,
    FrontendE2e,
}

impl Suite {
    /// All suites in canonical order.
    pub const ALL: [Suite; 3] = [Suite::Backend, Suite::FrontendUnit, Suite::FrontendE2e];

    /// Identifier used in logs, reports and the resume summary.
    pub fn name(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::FrontendUnit => "frontend-unit",
            Self::FrontendE2e => "frontend-e2e",
        }
    }

    /// Canonical suite order as plain identifiers.
    pub fn order() -> Vec<String> {
        Self::ALL.iter().map(|suite| suite.name().to_string()).collect()
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Suite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|suite| suite.name() == s)
            .ok_or_else(|| format!("unknown suite '{s}'"))
    }
}

/// Outcome class of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The command exited with return code 0.
    Ok,
    /// The command ran and exited non-zero.
    Failed,
    /// The command could not be started.
    Error,
    /// The suite was not executed in this run.
    Skipped,
}

impl StepStatus {
    /// Status of a command that ran to completion with `returncode`.
    pub fn from_returncode(returncode: i32) -> Self {
        if returncode == 0 { Self::Ok } else { Self::Failed }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome of running one suite command.
///
/// Built once per suite execution through one of the constructors, which
/// keep `status` consistent with `returncode`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Suite identifier, unique within a run.
    pub name: String,
    /// Argument vector that was executed.
    pub command: Vec<String>,
    pub returncode: i32,
    /// Wall-clock time from process start to process exit.
    pub duration: Duration,
    pub status: StepStatus,
    /// Last [`OUTPUT_TAIL_LINES`] lines of combined output.
    pub output_tail: Vec<String>,
    /// Suite-specific coverage summary lines.
    pub coverage: Vec<String>,
    /// Full captured output, when persisted.
    pub log_path: Option<PathBuf>,
}

impl StepResult {
    /// Result of a command that started and exited.
    pub fn completed(
        name: impl Into<String>,
        command: Vec<String>,
        returncode: i32,
        duration: Duration,
        output_tail: Vec<String>,
        log_path: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            returncode,
            duration,
            status: StepStatus::from_returncode(returncode),
            output_tail,
            coverage: Vec::new(),
            log_path,
        }
    }

    /// Result of a command that could not be started.
    ///
    /// A zero `returncode` is replaced by [`EXIT_LAUNCH_FAILED`] so an
    /// `error` result never looks successful to callers that only check the
    /// code.
    pub fn launch_error(
        name: impl Into<String>,
        command: Vec<String>,
        returncode: i32,
        duration: Duration,
        message: impl Into<String>,
        log_path: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            returncode: if returncode == 0 { EXIT_LAUNCH_FAILED } else { returncode },
            duration,
            status: StepStatus::Error,
            output_tail: vec![message.into()],
            coverage: Vec::new(),
            log_path,
        }
    }

    /// Placeholder for a suite that this run did not execute.
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: Vec::new(),
            returncode: 0,
            duration: Duration::ZERO,
            status: StepStatus::Skipped,
            output_tail: Vec::new(),
            coverage: Vec::new(),
            log_path: None,
        }
    }

    /// Returns this result with its coverage summary lines set.
    pub fn with_coverage(self, coverage: Vec<String>) -> Self {
        Self { coverage, ..self }
    }

    /// Returns this result with `lines` appended to the output tail, keeping
    /// the tail bounded.
    pub fn with_extra_output<I>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.output_tail.extend(lines);
        let excess = self.output_tail.len().saturating_sub(OUTPUT_TAIL_LINES);
        self.output_tail.drain(..excess);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == StepStatus::Ok
    }

    /// Whether this result passes for the overall exit code.
    ///
    /// Skipped suites passed in the run that was resumed from.
    pub fn is_passing(&self) -> bool {
        matches!(self.status, StepStatus::Ok | StepStatus::Skipped)
    }
}
