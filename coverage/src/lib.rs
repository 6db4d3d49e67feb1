//! Coverage readers, combined-coverage aggregation and the production-file
//! terminal report.
//!
//! Everything here consumes artifacts other tools produce; nothing measures
//! coverage itself:
//!
//! - [`engine`]: the [`CoverageEngine`] seam over a statement/branch coverage
//!   database, with [`CoveragePy`] driving `python -m coverage`.
//! - [`backend`]: backend summary lines (statements, branches, functions,
//!   lines, combined total).
//! - [`flow`]: end-to-end flow coverage from `flow-coverage.json`.
//! - [`unit`]: frontend unit coverage from an Istanbul `coverage-summary.json`.
//! - [`combined`]: the blended covered/total figure across categories.
//! - [`functions`]: function coverage derived from Python syntax trees.
//! - [`terminal`]: colorized per-file table, focus list, and the
//!   end-of-session summary hook registry.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use suite_runner_coverage::combined::{CoverageTotals, Ratio, combined_totals};
//!
//! let totals = CoverageTotals::from_value(&json!({
//!     "num_statements": 10,
//!     "missing_lines": 2,
//!     "num_branches": 4,
//!     "missing_branches": 1,
//! }));
//! let combined = combined_totals(Some(&totals), Some(Ratio::new(1, 2))).unwrap();
//! assert_eq!((combined.covered, combined.total), (20, 26));
//! ```

pub mod backend;
pub mod combined;
pub mod engine;
mod error;
pub mod filter;
pub mod flow;
pub mod functions;
pub mod terminal;
pub mod unit;

pub use engine::{CommandOutput, CoverageEngine, CoveragePy, CoverageReport};
pub use error::{CoverageError, Result};
pub use filter::is_production;
