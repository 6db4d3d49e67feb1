//! Function coverage derived from Python syntax trees.
//!
//! A function counts as covered when any executed line falls inside its
//! body span: from the line after `def` through its last line, or the `def`
//! line itself for single-line functions.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::combined::Ratio;
use crate::engine::FileCoverage;
use crate::filter::is_production;

/// Line extent of one function definition, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpan {
    /// Line of the `def` keyword (after decorators).
    pub def_line: u32,
    pub end_line: u32,
}

impl FunctionSpan {
    /// Lines whose execution marks the function as covered.
    pub fn body_lines(&self) -> RangeInclusive<u32> {
        if self.end_line > self.def_line {
            self.def_line + 1..=self.end_line
        } else {
            self.def_line..=self.end_line
        }
    }

    pub fn is_covered(&self, executed: &BTreeSet<u32>) -> bool {
        executed.range(self.body_lines()).next().is_some()
    }
}

/// Every function definition in `source`, including methods, nested and
/// async functions, ordered by position.
///
/// Returns `None` when the source does not parse cleanly.
pub fn function_spans(source: &str) -> Option<Vec<FunctionSpan>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let mut spans = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "function_definition" {
            spans.push(span_of(node));
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    spans.sort_by_key(|span| (span.def_line, span.end_line));
    Some(spans)
}

fn span_of(node: Node<'_>) -> FunctionSpan {
    FunctionSpan {
        def_line: node.start_position().row as u32 + 1,
        end_line: last_token_row(node) as u32 + 1,
    }
}

/// Row of the last non-empty, non-comment token under `node`. Zero-width
/// layout tokens and trailing comments do not extend a definition.
fn last_token_row(node: Node<'_>) -> usize {
    let mut current = node;
    loop {
        let last = (0..current.child_count())
            .rev()
            .filter_map(|index| current.child(index))
            .find(|child| child.start_byte() != child.end_byte() && child.kind() != "comment");
        match last {
            Some(child) => current = child,
            None => return current.end_position().row,
        }
    }
}

/// Counts covered functions across the production Python files of a report.
///
/// Relative report paths are resolved against `root`. Files that cannot be
/// read or parsed are skipped. Returns `None` when no function was found.
pub fn count_function_coverage(
    files: &BTreeMap<String, FileCoverage>,
    root: &Path,
) -> Option<Ratio> {
    let mut tally = Ratio::new(0, 0);
    for (raw_path, file) in files {
        if !is_production(raw_path.as_str()) {
            continue;
        }
        let path = root.join(raw_path);
        if path.extension().and_then(|ext| ext.to_str()) != Some("py") {
            continue;
        }
        let Ok(source) = fs::read_to_string(&path) else {
            debug!(path = %path.display(), "Skipping unreadable source file");
            continue;
        };
        let Some(spans) = function_spans(&source) else {
            debug!(path = %path.display(), "Skipping source file with syntax errors");
            continue;
        };
        let executed: BTreeSet<u32> = file.executed_lines.iter().copied().collect();
        for span in spans {
            tally.total += 1;
            if span.is_covered(&executed) {
                tally.covered += 1;
            }
        }
    }
    (tally.total > 0).then_some(tally)
}
