//! End-of-run report listing every suite in canonical order.

use std::io::{self, Write};
use std::path::Path;

use suite_runner_core::resume::resolve_log_path;
use suite_runner_core::{StepResult, StepStatus};

/// Tail lines shown for a suite whose output is not in a log.
const REPORT_TAIL_LINES: usize = 10;

/// Writes the final report for `results`.
///
/// Each suite gets a status line, its coverage lines, and either a pointer
/// to its log or, when there is no log or it never started, the end of its
/// output.
pub fn print_final_report(
    out: &mut dyn Write,
    results: &[StepResult],
    repo_root: &Path,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "Test suite summary")?;
    writeln!(out, "{}", "=".repeat(60))?;

    for result in results {
        if result.status == StepStatus::Skipped {
            writeln!(out, "{:<15} {:<8} (passed in the last run)", result.name, result.status)?;
            continue;
        }
        writeln!(
            out,
            "{:<15} {:<8} exit {:<4} {:>7.1}s",
            result.name,
            result.status,
            result.returncode,
            result.duration.as_secs_f64()
        )?;
        for line in &result.coverage {
            writeln!(out, "    {line}")?;
        }
        let show_tail = result.status == StepStatus::Error
            || (result.status == StepStatus::Failed && result.log_path.is_none());
        if show_tail {
            let skip = result.output_tail.len().saturating_sub(REPORT_TAIL_LINES);
            for line in &result.output_tail[skip..] {
                writeln!(out, "    | {line}")?;
            }
        }
        if let Some(log_path) = &result.log_path {
            writeln!(out, "    log: {}", resolve_log_path(log_path, repo_root))?;
        }
    }

    let failed: Vec<&str> = results
        .iter()
        .filter(|result| !result.is_passing())
        .map(|result| result.name.as_str())
        .collect();
    writeln!(out, "{}", "-".repeat(60))?;
    if failed.is_empty() {
        writeln!(out, "All suites passed")?;
    } else {
        writeln!(out, "Failed suites: {}", failed.join(", "))?;
    }
    Ok(())
}
