//! Frontend unit coverage from an Istanbul `json-summary` report.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::combined::{Ratio, format_line};
use crate::error::Result;

/// Location of the summary, relative to the frontend project root.
pub const UNIT_COVERAGE_PATH: &str = "coverage/coverage-summary.json";

#[derive(Debug, Clone, Copy, Deserialize)]
struct Metric {
    total: i64,
    covered: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct MetricTotals {
    statements: Option<Metric>,
    branches: Option<Metric>,
    functions: Option<Metric>,
    lines: Option<Metric>,
}

#[derive(Debug, Deserialize)]
struct SummaryFile {
    #[serde(default)]
    total: MetricTotals,
}

/// Project-wide unit coverage per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitCoverage {
    pub statements: Option<Ratio>,
    pub branches: Option<Ratio>,
    pub functions: Option<Ratio>,
    pub lines: Option<Ratio>,
}

impl UnitCoverage {
    pub fn summary_lines(&self) -> Vec<String> {
        [
            ("Statements", self.statements),
            ("Branches", self.branches),
            ("Functions", self.functions),
            ("Lines", self.lines),
        ]
        .into_iter()
        .filter_map(|(label, ratio)| Some(format_line(label, ratio?)))
        .collect()
    }
}

/// Reads the summary under `frontend_root`; `Ok(None)` when absent.
pub fn read_unit_coverage(frontend_root: &Path) -> Result<Option<UnitCoverage>> {
    let path = frontend_root.join(UNIT_COVERAGE_PATH);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let file: SummaryFile = serde_json::from_str(&raw)?;
    let ratio = |metric: Option<Metric>| metric.map(|m| Ratio::new(m.covered, m.total));
    Ok(Some(UnitCoverage {
        statements: ratio(file.total.statements),
        branches: ratio(file.total.branches),
        functions: ratio(file.total.functions),
        lines: ratio(file.total.lines),
    }))
}

/// Summary lines for the frontend unit suite; empty when no summary exists.
pub fn unit_coverage_summary(frontend_root: &Path) -> Vec<String> {
    match read_unit_coverage(frontend_root) {
        Ok(Some(coverage)) => coverage.summary_lines(),
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(error = %err, "Failed to read unit coverage summary");
            Vec::new()
        }
    }
}
