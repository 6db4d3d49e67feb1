//! Backend coverage summary lines.

use std::path::Path;

use tracing::warn;

use crate::combined::{CoverageTotals, Ratio, combined_totals, format_line};
use crate::engine::{CoverageEngine, CoverageReport, load_report};
use crate::error::Result;
use crate::functions::count_function_coverage;

/// Production coverage of the backend project.
#[derive(Debug, Clone, Default)]
pub struct BackendCoverage {
    pub totals: Option<CoverageTotals>,
    pub functions: Option<Ratio>,
}

impl BackendCoverage {
    /// Derives totals and function coverage from a production-only report.
    pub fn from_report(report: &CoverageReport, root: &Path) -> Self {
        Self {
            totals: report.totals.as_ref().map(CoverageTotals::from_value),
            functions: count_function_coverage(&report.files, root),
        }
    }

    pub fn combined(&self) -> Option<Ratio> {
        combined_totals(self.totals.as_ref(), self.functions)
    }

    /// `Statements`, `Branches`, `Functions`, `Lines` and `Total` lines.
    /// Categories without data are left out.
    pub fn summary_lines(&self) -> Vec<String> {
        let totals = self.totals.unwrap_or_default();
        [
            ("Statements", totals.statements()),
            ("Branches", totals.branches()),
            ("Functions", self.functions),
            ("Lines", totals.lines()),
            ("Total", self.combined()),
        ]
        .into_iter()
        .filter_map(|(label, ratio)| Some(format_line(label, ratio?)))
        .collect()
    }
}

/// Reads backend coverage through `engine`.
///
/// Returns `Ok(None)` when there is no coverage database.
pub fn read_backend_coverage(
    engine: &dyn CoverageEngine,
    root: &Path,
) -> Result<Option<BackendCoverage>> {
    Ok(load_report(engine)?.map(|report| BackendCoverage::from_report(&report, root)))
}

/// Summary lines for the backend suite; empty when coverage is unavailable.
pub fn backend_coverage_summary(engine: &dyn CoverageEngine, root: &Path) -> Vec<String> {
    match read_backend_coverage(engine, root) {
        Ok(Some(coverage)) => coverage.summary_lines(),
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(error = %err, "Failed to read backend coverage");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_lines_with_all_categories() {
        let coverage = BackendCoverage {
            totals: Some(CoverageTotals::from_value(&json!({
                "num_statements": 10,
                "missing_lines": 2,
                "num_branches": 4,
                "missing_branches": 1,
            }))),
            functions: Some(Ratio::new(1, 2)),
        };

        assert_eq!(
            coverage.summary_lines(),
            vec![
                "Statements: 80.0% (8/10)",
                "Branches: 75.0% (3/4)",
                "Functions: 50.0% (1/2)",
                "Lines: 80.0% (8/10)",
                "Total: 76.9% (20/26)",
            ]
        );
    }

    #[test]
    fn test_summary_lines_degrade_without_branches_or_functions() {
        let coverage = BackendCoverage {
            totals: Some(CoverageTotals::from_value(&json!({
                "num_statements": 10,
                "missing_lines": 2,
            }))),
            functions: None,
        };

        assert_eq!(
            coverage.summary_lines(),
            vec![
                "Statements: 80.0% (8/10)",
                "Lines: 80.0% (8/10)",
                "Total: 80.0% (16/20)",
            ]
        );
    }

    #[test]
    fn test_summary_lines_empty_without_data() {
        assert!(BackendCoverage::default().summary_lines().is_empty());
    }
}
