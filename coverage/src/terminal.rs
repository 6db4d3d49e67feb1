//! Colorized production-file coverage report for the end of a test session.
//!
//! The report has three parts: a per-file table sorted by path with a
//! 20-cell bar, a `TOTAL` line (plus `TOTAL (combined)` when any category
//! produced data), and a focus list of the ten worst files below 100%.
//!
//! [`TerminalSummaryHooks`] models the end-of-session summary callbacks.
//! Installing a [`CoverageReporter`] silences the coverage plugin's own
//! summary so a session never prints two coverage tables.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::backend::BackendCoverage;
use crate::combined::Ratio;
use crate::engine::{CoverageEngine, CoverageReport, load_report};
use crate::error::Result;

/// Width of the file column in the main table.
const FILE_COLUMN: usize = 60;

/// Width of the horizontal rules and section separators.
const RULE_WIDTH: usize = FILE_COLUMN + 42;

/// Bar width in the main table.
pub const TABLE_BAR_WIDTH: usize = 20;

/// Bar width in the focus list.
pub const FOCUS_BAR_WIDTH: usize = 15;

/// Maximum number of files in the focus list.
pub const FOCUS_LIMIT: usize = 10;

/// Name under which the coverage plugin registers its own summary.
pub const COVERAGE_PLUGIN_HOOK: &str = "_cov";

/// Name under which [`CoverageReporter`] registers.
pub const PRODUCTION_REPORT_HOOK: &str = "production-coverage";

/// Escape sequences used by the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub green: &'static str,
    pub yellow: &'static str,
    pub red: &'static str,
    pub bold: &'static str,
    pub dim: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub const ANSI: Palette = Palette {
        green: "\x1b[32m",
        yellow: "\x1b[33m",
        red: "\x1b[31m",
        bold: "\x1b[1m",
        dim: "\x1b[2m",
        reset: "\x1b[0m",
    };

    pub const PLAIN: Palette = Palette {
        green: "",
        yellow: "",
        red: "",
        bold: "",
        dim: "",
        reset: "",
    };

    /// Green at 90% and above, yellow at 70% and above, red below.
    pub fn colour(&self, pct: f64) -> &'static str {
        if pct >= 90.0 {
            self.green
        } else if pct >= 70.0 {
            self.yellow
        } else {
            self.red
        }
    }
}

/// Text bar of `width` cells with `round(pct / 100 * width)` filled.
///
/// Halves round to even.
pub fn bar(pct: f64, width: usize) -> String {
    let filled = (pct / 100.0 * width as f64).round_ties_even().clamp(0.0, width as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// One production file in the report.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub display: String,
    pub statements: i64,
    pub missing: i64,
    pub percent: f64,
}

/// Production rows of `report`, sorted by display path.
///
/// Absolute paths under `root` are shown relative to it.
pub fn file_rows(report: &CoverageReport, root: &Path) -> Vec<FileRow> {
    let mut rows: Vec<FileRow> = report
        .production_files()
        .map(|(raw_path, file)| {
            let path = Path::new(raw_path);
            let display = if path.is_absolute() {
                path.strip_prefix(root)
                    .map(|relative| relative.display().to_string())
                    .unwrap_or_else(|_| raw_path.to_string())
            } else {
                raw_path.to_string()
            };
            FileRow {
                display,
                statements: file.summary.num_statements,
                missing: file.summary.missing_lines,
                percent: file.summary.percent_covered(),
            }
        })
        .collect();
    rows.sort_by(|a, b| a.display.cmp(&b.display));
    rows
}

/// Statement totals across `rows`; 100% when there are no statements.
pub fn project_total(rows: &[FileRow]) -> (i64, i64, f64) {
    let statements: i64 = rows.iter().map(|row| row.statements).sum();
    let missing: i64 = rows.iter().map(|row| row.missing).sum();
    let pct = if statements > 0 {
        (statements - missing) as f64 / statements as f64 * 100.0
    } else {
        100.0
    };
    (statements, missing, pct)
}

/// Up to [`FOCUS_LIMIT`] rows below 100%, worst first.
pub fn focus_rows(rows: &[FileRow]) -> Vec<&FileRow> {
    let mut focus: Vec<&FileRow> = rows.iter().filter(|row| row.percent < 100.0).collect();
    focus.sort_by(|a, b| a.percent.total_cmp(&b.percent));
    focus.truncate(FOCUS_LIMIT);
    focus
}

/// Renders the full report, or `None` when `rows` is empty.
pub fn render_report(rows: &[FileRow], combined: Option<Ratio>, palette: &Palette) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let Palette { bold, dim, reset, .. } = *palette;
    let rule = format!("{dim}{}{reset}", "─".repeat(RULE_WIDTH));
    let mut out = String::new();

    let _ = writeln!(out, "{}", separator('=', &format!("{bold}Coverage Report  (production files){reset}")));
    let _ = writeln!(
        out,
        "{bold}{:<FILE_COLUMN$}  {:>6}  {:>6}  {:>6}  Bar{reset}",
        "File", "Stmts", "Miss", "Cover"
    );
    let _ = writeln!(out, "{rule}");

    for row in rows {
        let c = palette.colour(row.percent);
        let _ = writeln!(
            out,
            "{:<FILE_COLUMN$}  {:>6}  {:>6}  {c}{:>5.1}%{reset}  {c}{}{reset}",
            truncate_path(&row.display),
            row.statements,
            row.missing,
            row.percent,
            bar(row.percent, TABLE_BAR_WIDTH),
        );
    }

    let (total_stmts, total_missing, total_pct) = project_total(rows);
    let tc = palette.colour(total_pct);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "{bold}{:<FILE_COLUMN$}  {total_stmts:>6}  {total_missing:>6}  {tc}{total_pct:>5.1}%{reset}  {tc}{}{reset}",
        "TOTAL",
        bar(total_pct, TABLE_BAR_WIDTH),
    );
    if let Some(combined) = combined {
        let pct = combined.percent();
        let cc = palette.colour(pct);
        let _ = writeln!(
            out,
            "{bold}{:<FILE_COLUMN$}  {:>6}  {:>6}  {cc}{pct:>5.1}%{reset}  {cc}{}{reset}",
            "TOTAL (combined)",
            combined.total,
            combined.missing(),
            bar(pct, TABLE_BAR_WIDTH),
        );
    }

    let focus = focus_rows(rows);
    if !focus.is_empty() {
        let title = format!(
            "Top-{} files to focus on  (lowest coverage, total project: {tc}{total_pct:.1}%{reset})",
            focus.len()
        );
        let _ = writeln!(out, "{}", separator('-', &title));
        for (rank, row) in focus.iter().enumerate() {
            let c = palette.colour(row.percent);
            let plural = if row.missing == 1 { "" } else { "s" };
            let _ = writeln!(
                out,
                "  {bold}{:>2}.{reset} {c}{:>5.1}%  {}{reset}  {}  {dim}({} line{plural} uncovered){reset}",
                rank + 1,
                row.percent,
                bar(row.percent, FOCUS_BAR_WIDTH),
                row.display,
                row.missing,
            );
        }
    }
    Some(out)
}

fn truncate_path(display: &str) -> String {
    if display.chars().count() > FILE_COLUMN {
        let head: String = display.chars().take(FILE_COLUMN - 3).collect();
        format!("{head}...")
    } else {
        display.to_string()
    }
}

/// Centers `title` in a line of `fill` characters, ignoring escape
/// sequences when measuring.
fn separator(fill: char, title: &str) -> String {
    let title_width = visible_width(title) + 2;
    let padding = RULE_WIDTH.saturating_sub(title_width).max(2);
    let left = padding / 2;
    let right = padding - left;
    format!(
        "{} {title} {}",
        fill.to_string().repeat(left),
        fill.to_string().repeat(right)
    )
}

fn visible_width(text: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for ch in text.chars() {
        match (in_escape, ch) {
            (false, '\x1b') => in_escape = true,
            (true, 'm') => in_escape = false,
            (true, _) => {}
            (false, _) => width += 1,
        }
    }
    width
}

/// Production coverage report bound to a coverage engine.
#[derive(Clone)]
pub struct CoverageReporter {
    engine: Arc<dyn CoverageEngine>,
    root: PathBuf,
    palette: Palette,
}

impl CoverageReporter {
    pub fn new(engine: Arc<dyn CoverageEngine>, root: impl Into<PathBuf>, palette: Palette) -> Self {
        Self {
            engine,
            root: root.into(),
            palette,
        }
    }

    /// Renders the report; `Ok(None)` when there is nothing to report.
    pub fn render(&self) -> Result<Option<String>> {
        let Some(report) = load_report(self.engine.as_ref())? else {
            return Ok(None);
        };
        let rows = file_rows(&report, &self.root);
        let combined = BackendCoverage::from_report(&report, &self.root).combined();
        Ok(render_report(&rows, combined, &self.palette))
    }

    /// Writes the report to `out`.
    ///
    /// Never fails: a reporting problem must not affect the test run, so
    /// every error and panic is logged and dropped.
    pub fn write_summary(&self, out: &mut dyn Write) {
        let rendered = catch_unwind(AssertUnwindSafe(|| self.render()));
        let outcome = match rendered {
            Ok(Ok(Some(text))) => out.write_all(text.as_bytes()).map_err(|err| err.to_string()),
            Ok(Ok(None)) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("reporter panicked".to_string()),
        };
        if let Err(err) = outcome {
            debug!(error = %err, "Coverage report skipped");
        }
    }

    /// Registers this reporter on `hooks`, replacing the coverage plugin's
    /// own summary with a no-op. Installing twice has no further effect.
    pub fn install(self, hooks: &mut TerminalSummaryHooks) {
        let silenced: SummaryHook = Box::new(|_: &mut dyn Write| Ok(()));
        if hooks.replace(COVERAGE_PLUGIN_HOOK, silenced) {
            debug!("Silenced coverage plugin terminal summary");
        }
        if hooks.is_registered(PRODUCTION_REPORT_HOOK) {
            return;
        }
        hooks.register(
            PRODUCTION_REPORT_HOOK,
            Box::new(move |out: &mut dyn Write| -> io::Result<()> {
                self.write_summary(out);
                Ok(())
            }),
        );
    }
}

/// One end-of-session summary callback.
pub type SummaryHook = Box<dyn Fn(&mut dyn Write) -> io::Result<()> + Send + Sync>;

/// Ordered registry of end-of-session summary callbacks.
#[derive(Default)]
pub struct TerminalSummaryHooks {
    hooks: Vec<(String, SummaryHook)>,
}

impl TerminalSummaryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, hook: SummaryHook) {
        self.hooks.push((name.into(), hook));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.hooks.iter().any(|(registered, _)| registered == name)
    }

    /// Swaps the callback registered as `name`; `false` if there is none.
    pub fn replace(&mut self, name: &str, hook: SummaryHook) -> bool {
        match self.hooks.iter_mut().find(|(registered, _)| registered == name) {
            Some(slot) => {
                slot.1 = hook;
                true
            }
            None => false,
        }
    }

    /// Runs every callback in registration order.
    pub fn emit(&self, out: &mut dyn Write) -> io::Result<()> {
        for (_, hook) in &self.hooks {
            hook(out)?;
        }
        Ok(())
    }
}

/// The coverage engine's own text summary, as the coverage plugin prints it.
pub fn engine_summary_hook(engine: Arc<dyn CoverageEngine>) -> SummaryHook {
    Box::new(move |out: &mut dyn Write| match engine.text_report() {
        Ok(text) => out.write_all(text.as_bytes()),
        Err(err) => {
            debug!(error = %err, "Coverage plugin summary unavailable");
            Ok(())
        }
    })
}
