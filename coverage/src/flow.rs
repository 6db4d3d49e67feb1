//! End-to-end flow coverage.
//!
//! The e2e reporter writes `e2e-results/flow-coverage.json` with a `summary`
//! object of flow counts. Only the summary is read here.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;

/// Location of the flow coverage file, relative to the results directory.
pub const FLOW_COVERAGE_PATH: &str = "e2e-results/flow-coverage.json";

/// Flow counts from the `summary` object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct FlowSummary {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub covered: i64,
    #[serde(default)]
    pub partial: i64,
    #[serde(default)]
    pub failing: i64,
    #[serde(default)]
    pub missing: i64,
}

#[derive(Debug, Deserialize)]
struct FlowCoverageFile {
    summary: FlowSummary,
}

impl FlowSummary {
    /// Covered share in percent; 0% when no flows are defined.
    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            self.covered as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!(
                "Flows covered: {}/{} ({:.1}%)",
                self.covered,
                self.total,
                self.percent()
            ),
            format!("Partial: {}", self.partial),
            format!("Missing: {}", self.missing),
        ]
    }
}

/// Reads the flow summary under `results_dir`; `Ok(None)` when absent.
pub fn read_flow_coverage(results_dir: &Path) -> Result<Option<FlowSummary>> {
    let path = results_dir.join(FLOW_COVERAGE_PATH);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let file: FlowCoverageFile = serde_json::from_str(&raw)?;
    Ok(Some(file.summary))
}

/// Summary lines for the e2e suite; empty when no flow coverage exists.
pub fn flow_coverage_summary(results_dir: &Path) -> Vec<String> {
    match read_flow_coverage(results_dir) {
        Ok(Some(summary)) => summary.summary_lines(),
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(error = %err, "Failed to read flow coverage");
            Vec::new()
        }
    }
}
