//! Persisted summary of the last run, used by `--resume`.
//!
//! The summary is plain JSON so it can be inspected and hand-edited:
//!
//! ```json
//! {
//!   "run_id": "7f0c…",
//!   "generated_at": "2026-01-15T10:30:00+00:00",
//!   "suites": [
//!     {"name": "backend", "status": "ok", "returncode": 0, "log_path": "test-reports/backend.log"}
//!   ]
//! }
//! ```
//!
//! Entries are kept as untyped JSON objects. A partial re-run carries the
//! untouched suites' entries forward verbatim, including fields this crate
//! does not know about.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ResumeError, Result};
use crate::types::StepResult;

/// File name of the summary inside the report directory.
pub const RESUME_FILENAME: &str = "last-run.json";

/// Status reported for a suite with no recorded entry.
pub const UNKNOWN_STATUS: &str = "unknown";

/// One suite entry of a summary: at least `name`, usually `status`,
/// `returncode` and `log_path`.
pub type ResumeEntry = Map<String, Value>;

/// Summary written at the end of every run that executed a suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSummary {
    pub run_id: String,
    pub generated_at: String,
    pub suites: Vec<ResumeEntry>,
}

/// Loads the summary at `path`.
///
/// Returns `Ok(None)` when the file does not exist. A file that exists but
/// does not hold a JSON object is an error, never "no prior run".
pub fn load(path: &Path) -> Result<Option<Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No resume summary found");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let value: Value = serde_json::from_str(&raw)?;
    if !value.is_object() {
        return Err(ResumeError::Malformed(format!(
            "'{}' does not contain a JSON object",
            path.display()
        )));
    }
    Ok(Some(value))
}

/// Maps suite names to their entries, dropping every element of `suites`
/// that is not an object with a string `name`.
pub fn extract_entries(summary: &Value) -> BTreeMap<String, ResumeEntry> {
    let Some(suites) = summary.get("suites").and_then(Value::as_array) else {
        return BTreeMap::new();
    };
    suites
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| Some((entry_name(entry)?.to_string(), entry.clone())))
        .collect()
}

/// Status recorded for a suite.
///
/// An explicit `status` field wins; otherwise the status is derived from
/// `returncode`, and a suite with no entry is [`UNKNOWN_STATUS`].
pub fn status_of(entry: Option<&ResumeEntry>) -> &str {
    let Some(entry) = entry else {
        return UNKNOWN_STATUS;
    };
    if let Some(status) = entry.get("status").and_then(Value::as_str) {
        return status;
    }
    if entry.get("returncode").and_then(Value::as_i64) == Some(0) {
        "ok"
    } else {
        "failed"
    }
}

/// Builds the summary for a run.
///
/// `suites` follows `suite_order`, whatever order `results` arrived in.
/// Suites in `suite_order` without a new result keep their entry from
/// `existing_entries`. Results for suites outside `suite_order` are appended
/// in the order given.
pub fn build<S: AsRef<str>>(
    results: &[StepResult],
    run_id: &str,
    repo_root: &Path,
    suite_order: &[S],
    existing_entries: Option<&BTreeMap<String, ResumeEntry>>,
) -> ResumeSummary {
    let by_name: BTreeMap<&str, &StepResult> = results
        .iter()
        .map(|result| (result.name.as_str(), result))
        .collect();

    let mut suites = Vec::with_capacity(suite_order.len());
    for name in suite_order.iter().map(AsRef::as_ref) {
        if let Some(result) = by_name.get(name) {
            suites.push(entry_for(result, repo_root));
        } else if let Some(entry) = existing_entries.and_then(|entries| entries.get(name)) {
            suites.push(entry.clone());
        }
    }
    for result in results {
        if !suite_order.iter().any(|name| name.as_ref() == result.name) {
            suites.push(entry_for(result, repo_root));
        }
    }

    ResumeSummary {
        run_id: run_id.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        suites,
    }
}

/// Writes `summary` to `path`, replacing any previous file atomically.
pub fn write(path: &Path, summary: &ResumeSummary) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, summary)?;
    file.write_all(b"\n")?;
    file.persist(path)?;
    Ok(())
}

/// Formats `log_path` for the summary.
///
/// Both paths are made absolute and `.`/`..` components are folded away
/// before comparing. A log under `repo_root` is stored relative to it; any
/// other log is stored as its absolute path.
pub fn resolve_log_path(log_path: &Path, repo_root: &Path) -> String {
    let root = normalize(repo_root);
    let log = normalize(log_path);
    match log.strip_prefix(&root) {
        Ok(relative) => relative.display().to_string(),
        Err(_) => log.display().to_string(),
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn entry_for(result: &StepResult, repo_root: &Path) -> ResumeEntry {
    let mut entry = Map::new();
    entry.insert("name".into(), json!(result.name));
    entry.insert("status".into(), json!(result.status.as_str()));
    entry.insert("returncode".into(), json!(result.returncode));
    entry.insert("duration".into(), json!(result.duration.as_secs_f64()));
    if let Some(log_path) = &result.log_path {
        entry.insert("log_path".into(), json!(resolve_log_path(log_path, repo_root)));
    }
    entry
}

fn entry_name(entry: &ResumeEntry) -> Option<&str> {
    entry.get("name").and_then(Value::as_str)
}
