//! Production-file classification.

use std::path::Path;

/// Path components that mark a file as non-production.
pub const EXCLUDED_PARTS: &[&str] = &[
    "tests",
    "migrations",
    "venv",
    "__pycache__",
    "conftest.py",
    ".git",
];

/// Omit globs handed to the coverage engine when generating a report.
pub const OMIT_GLOBS: &[&str] = &[
    "*/venv/*",
    "*/migrations/*",
    "*/tests/*",
    "*/conftest*",
    "*/__pycache__/*",
];

/// Returns `true` if no component of `path` marks it as a test, migration,
/// virtual-environment, cache or version-control file.
///
/// # Examples
///
/// ```
/// use suite_runner_coverage::is_production;
///
/// assert!(is_production("app/views/auth.py"));
/// assert!(!is_production("app/tests/test_auth.py"));
/// assert!(!is_production("app/migrations/0001_initial.py"));
/// ```
pub fn is_production(path: impl AsRef<Path>) -> bool {
    !path.as_ref().components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|part| EXCLUDED_PARTS.contains(&part))
    })
}
