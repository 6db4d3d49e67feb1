//! Blending statement, branch, line and function coverage into one figure.
//!
//! Each category contributes only when both its total and its covered count
//! are present integers. The line category falls back to the statement count
//! when the report has no `num_lines`, so on such reports statements are
//! counted twice; the combined figure keeps that behavior.

use serde_json::Value;

/// A covered/total pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    pub covered: i64,
    pub total: i64,
}

impl Ratio {
    pub fn new(covered: i64, total: i64) -> Self {
        Self { covered, total }
    }

    /// Covered share in percent; 100% when there is nothing to cover.
    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            self.covered as f64 / self.total as f64 * 100.0
        } else {
            100.0
        }
    }

    pub fn missing(&self) -> i64 {
        self.total.saturating_sub(self.covered)
    }
}

impl std::ops::Add for Ratio {
    type Output = Ratio;

    fn add(self, other: Ratio) -> Ratio {
        Ratio::new(
            self.covered.saturating_add(other.covered),
            self.total.saturating_add(other.total),
        )
    }
}

/// Whole-run totals from a coverage report.
///
/// Fields are `None` when absent or not an integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageTotals {
    pub num_statements: Option<i64>,
    pub missing_lines: Option<i64>,
    pub covered_lines: Option<i64>,
    pub num_branches: Option<i64>,
    pub missing_branches: Option<i64>,
    pub covered_branches: Option<i64>,
    pub num_lines: Option<i64>,
}

impl CoverageTotals {
    /// Reads the known fields of a `totals` object. Non-objects yield all
    /// fields absent.
    pub fn from_value(value: &Value) -> Self {
        let int = |key: &str| value.get(key).and_then(Value::as_i64);
        Self {
            num_statements: int("num_statements"),
            missing_lines: int("missing_lines"),
            covered_lines: int("covered_lines"),
            num_branches: int("num_branches"),
            missing_branches: int("missing_branches"),
            covered_branches: int("covered_branches"),
            num_lines: int("num_lines"),
        }
    }

    fn covered_lines(&self) -> Option<i64> {
        self.covered_lines
            .or_else(|| Some(self.num_statements?.saturating_sub(self.missing_lines?)))
    }

    fn covered_branches(&self) -> Option<i64> {
        self.covered_branches
            .or_else(|| Some(self.num_branches?.saturating_sub(self.missing_branches?)))
    }

    pub fn statements(&self) -> Option<Ratio> {
        Some(Ratio::new(self.covered_lines()?, self.num_statements?))
    }

    pub fn branches(&self) -> Option<Ratio> {
        Some(Ratio::new(self.covered_branches()?, self.num_branches?))
    }

    /// Line coverage; the total is `num_lines`, or the statement count when
    /// the report has none.
    pub fn lines(&self) -> Option<Ratio> {
        let total = self.num_lines.or(self.num_statements)?;
        Some(Ratio::new(self.covered_lines()?, total))
    }
}

/// Sums every available category into one covered/total pair.
///
/// Returns `None`, not zero, when no category contributes any item.
pub fn combined_totals(totals: Option<&CoverageTotals>, functions: Option<Ratio>) -> Option<Ratio> {
    let categories = totals
        .map(|totals| [totals.statements(), totals.branches(), totals.lines()])
        .unwrap_or_default();
    let combined = categories
        .into_iter()
        .chain([functions])
        .flatten()
        .fold(Ratio::new(0, 0), |acc, ratio| acc + ratio);

    (combined.total != 0).then_some(combined)
}

/// Formats one summary line, e.g. `Statements: 80.0% (8/10)`.
pub fn format_line(label: &str, ratio: Ratio) -> String {
    format!(
        "{label}: {:.1}% ({}/{})",
        ratio.percent(),
        ratio.covered,
        ratio.total
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_statements_only_counts_line_category_twice() {
        // Without num_lines the line category reuses the statement numbers.
        let totals = CoverageTotals::from_value(&json!({
            "num_statements": 10,
            "missing_lines": 2,
            "covered_lines": 8,
        }));

        let combined = combined_totals(Some(&totals), None).unwrap();

        assert_eq!(combined, Ratio::new(16, 20));
        assert_eq!(combined.percent(), 80.0);
    }

    #[test]
    fn test_num_lines_replaces_statement_total_for_lines() {
        let totals = CoverageTotals::from_value(&json!({
            "num_statements": 10,
            "missing_lines": 2,
            "covered_lines": 8,
            "num_lines": 12,
        }));

        assert_eq!(totals.lines(), Some(Ratio::new(8, 12)));
        assert_eq!(combined_totals(Some(&totals), None), Some(Ratio::new(16, 22)));
    }

    #[test]
    fn test_all_categories_combine() {
        let totals = CoverageTotals::from_value(&json!({
            "num_statements": 10,
            "missing_lines": 2,
            "covered_lines": 8,
            "num_branches": 4,
            "missing_branches": 1,
            "covered_branches": 3,
        }));

        let combined = combined_totals(Some(&totals), Some(Ratio::new(1, 2))).unwrap();

        assert_eq!(combined, Ratio::new(20, 26));
    }

    #[test]
    fn test_covered_counts_derived_from_missing() {
        let totals = CoverageTotals::from_value(&json!({
            "num_statements": 10,
            "missing_lines": 4,
            "num_branches": 6,
            "missing_branches": 6,
        }));
        assert_eq!(totals.statements(), Some(Ratio::new(6, 10)));
        assert_eq!(totals.branches(), Some(Ratio::new(0, 6)));
    }

    #[test]
    fn test_mistyped_fields_are_ignored() {
        let totals = CoverageTotals::from_value(&json!({
            "num_statements": "10",
            "missing_lines": 2,
            "num_branches": 4.0,
            "missing_branches": 1,
        }));
        assert_eq!(totals.statements(), None);
        assert_eq!(totals.branches(), None);
        assert_eq!(combined_totals(Some(&totals), None), None);
    }

    #[test]
    fn test_absent_data_is_none_not_zero() {
        assert_eq!(combined_totals(None, None), None);
        assert_eq!(combined_totals(Some(&CoverageTotals::default()), None), None);

        let empty = CoverageTotals::from_value(&json!({"num_statements": 0, "missing_lines": 0}));
        assert_eq!(combined_totals(Some(&empty), None), None);
    }

    #[test]
    fn test_functions_alone_contribute() {
        assert_eq!(combined_totals(None, Some(Ratio::new(3, 4))), Some(Ratio::new(3, 4)));
    }

    #[test]
    fn test_extreme_totals_saturate() {
        let totals = CoverageTotals::from_value(&json!({
            "num_statements": i64::MAX, "missing_lines": i64::MIN,
            "num_branches": i64::MAX, "missing_branches": 0
        }));
        let combined = combined_totals(Some(&totals), Some(Ratio::new(1, 1))).unwrap();
        assert_eq!(combined, Ratio::new(i64::MAX, i64::MAX));
        assert_eq!(Ratio::new(i64::MIN, i64::MAX).missing(), i64::MAX);
    }

    #[test]
    fn test_format_line() {
        assert_eq!(format_line("Branches", Ratio::new(3, 4)), "Branches: 75.0% (3/4)");
        assert_eq!(format_line("Functions", Ratio::new(0, 0)), "Functions: 100.0% (0/0)");
    }
}
