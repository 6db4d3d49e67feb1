//! Runs one suite command as a child process.
//!
//! Stdout and stderr are drained on reader threads and funnelled through a
//! channel, so the log file, the live echo and the output tail all see the
//! combined stream in arrival order.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use suite_runner_core::{
    EXIT_LAUNCH_FAILED, EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND, OUTPUT_TAIL_LINES, StepResult,
};

/// Everything needed to execute one suite command.
#[derive(Debug, Clone, Default)]
pub struct StepRequest {
    pub name: String,
    pub command: Vec<String>,
    pub cwd: PathBuf,
    /// Where to persist the full output. Parent directories are created.
    pub log_path: Option<PathBuf>,
    /// Append to an existing log instead of truncating it.
    pub append_log: bool,
    /// Suppress the live echo of child output.
    pub quiet: bool,
    /// Written to the log before any output.
    pub log_header: Option<String>,
}

/// Header block identifying one execution inside a suite log.
pub fn build_log_header(run_id: &str, name: &str, command: &[String]) -> String {
    format!(
        "==> Resume run: {run_id}\nSuite: {name}\nCommand: {}\nTimestamp: {}\n\n",
        command.join(" "),
        Utc::now().to_rfc3339()
    )
}

/// Executes `request` and reports how it went.
///
/// Never fails: launch problems become a [`StepResult`] with status `error`
/// and a non-zero return code.
pub fn run_command(request: &StepRequest) -> StepResult {
    let started = Instant::now();
    let name = request.name.as_str();

    let mut log = match open_log(request) {
        Ok(log) => log,
        Err(err) => {
            let message = format!(
                "failed to open log '{}': {err}",
                request.log_path.as_deref().unwrap_or(Path::new("")).display()
            );
            warn!(suite = name, error = %err, "Failed to open suite log");
            return finish(StepResult::launch_error(
                name,
                request.command.clone(),
                EXIT_LAUNCH_FAILED,
                started.elapsed(),
                message,
                request.log_path.clone(),
            ));
        }
    };

    let Some((program, args)) = request.command.split_first() else {
        return finish(StepResult::launch_error(
            name,
            Vec::new(),
            EXIT_LAUNCH_FAILED,
            started.elapsed(),
            "empty command",
            request.log_path.clone(),
        ));
    };

    let mut command = Command::new(resolve_program(program, &request.cwd));
    command
        .args(args)
        .current_dir(&request.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!(suite = name, command = ?request.command, cwd = %request.cwd.display(), "Starting suite");

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            let message = format!("failed to start '{program}': {err}");
            warn!(suite = name, error = %err, "Failed to start suite command");
            if let Some(file) = log.as_mut() {
                let _ = writeln!(file, "{message}");
            }
            return finish(StepResult::launch_error(
                name,
                request.command.clone(),
                launch_error_code(&err),
                started.elapsed(),
                message,
                request.log_path.clone(),
            ));
        }
    };

    let (tx, rx) = mpsc::channel();
    let readers: Vec<JoinHandle<()>> = [
        child.stdout.take().map(|pipe| forward_lines(pipe, tx.clone())),
        child.stderr.take().map(|pipe| forward_lines(pipe, tx.clone())),
    ]
    .into_iter()
    .flatten()
    .collect();
    drop(tx);

    let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES + 1);
    for chunk in rx {
        if let Some(file) = log.as_mut() {
            if let Err(err) = file.write_all(&chunk) {
                warn!(suite = name, error = %err, "Failed to write suite log, continuing without it");
                log = None;
            }
        }
        if !request.quiet {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(&chunk);
            let _ = stdout.flush();
        }
        tail.push_back(
            String::from_utf8_lossy(&chunk)
                .trim_end_matches(['\n', '\r'])
                .to_string(),
        );
        if tail.len() > OUTPUT_TAIL_LINES {
            tail.pop_front();
        }
    }
    for reader in readers {
        let _ = reader.join();
    }

    let result = match child.wait() {
        Ok(status) => StepResult::completed(
            name,
            request.command.clone(),
            exit_code(status),
            started.elapsed(),
            tail.into(),
            request.log_path.clone(),
        ),
        Err(err) => {
            warn!(suite = name, error = %err, "Failed to wait on suite command");
            StepResult::launch_error(
                name,
                request.command.clone(),
                EXIT_LAUNCH_FAILED,
                started.elapsed(),
                format!("failed to wait on '{program}': {err}"),
                request.log_path.clone(),
            )
        }
    };
    if let Some(mut file) = log {
        let _ = file.flush();
    }
    finish(result)
}

/// Prints the one-line status every step ends with.
fn finish(result: StepResult) -> StepResult {
    println!(
        "[{}] {} (exit {}, {:.1}s)",
        result.name,
        result.status,
        result.returncode,
        result.duration.as_secs_f64()
    );
    result
}

fn open_log(request: &StepRequest) -> io::Result<Option<File>> {
    let Some(path) = request.log_path.as_deref() else {
        return Ok(None);
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(request.append_log)
        .truncate(!request.append_log)
        .open(path)?;
    if let Some(header) = &request.log_header {
        file.write_all(header.as_bytes())?;
    }
    Ok(Some(file))
}

fn forward_lines<R>(pipe: R, tx: Sender<Vec<u8>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        loop {
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "Failed to read child output");
                    break;
                }
            }
        }
    })
}

/// A relative program path with a separator is taken relative to `cwd`;
/// bare names are looked up on `PATH`.
pub fn resolve_program(program: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        cwd.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Synthetic return code for a command that could not be started.
pub fn launch_error_code(err: &io::Error) -> i32 {
    match err.kind() {
        ErrorKind::NotFound => EXIT_NOT_FOUND,
        ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
        _ => EXIT_LAUNCH_FAILED,
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(EXIT_LAUNCH_FAILED)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(EXIT_LAUNCH_FAILED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use suite_runner_core::StepStatus;

    fn sh(name: &str, script: &str, dir: &Path) -> StepRequest {
        StepRequest {
            name: name.to_string(),
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            cwd: dir.to_path_buf(),
            quiet: true,
            ..StepRequest::default()
        }
    }

    #[test]
    fn test_log_header_fields() {
        let header = build_log_header("run-1", "backend", &["pytest".into(), "-q".into()]);
        assert!(header.contains("Resume run: run-1"));
        assert!(header.contains("Suite: backend"));
        assert!(header.contains("Command: pytest -q"));
        assert!(header.contains("Timestamp: "));
    }

    #[test]
    fn test_resolve_program() {
        let cwd = Path::new("/repo/frontend");
        assert_eq!(resolve_program("npm", cwd), PathBuf::from("npm"));
        assert_eq!(
            resolve_program("venv/bin/python", cwd),
            PathBuf::from("/repo/frontend/venv/bin/python")
        );
        assert_eq!(resolve_program("/usr/bin/env", cwd), PathBuf::from("/usr/bin/env"));
    }

    #[test]
    fn test_launch_error_codes() {
        assert_eq!(launch_error_code(&io::Error::from(ErrorKind::NotFound)), 127);
        assert_eq!(launch_error_code(&io::Error::from(ErrorKind::PermissionDenied)), 126);
        assert_eq!(launch_error_code(&io::Error::from(ErrorKind::Other)), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_success_is_logged_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("reports/backend.log");
        let request = StepRequest {
            log_path: Some(log_path.clone()),
            log_header: Some("HEADER\n".to_string()),
            ..sh("backend", "echo out; echo err 1>&2", dir.path())
        };

        let result = run_command(&request);

        assert_eq!(result.status, StepStatus::Ok);
        assert_eq!(result.returncode, 0);
        assert_eq!(result.log_path, Some(log_path.clone()));
        let mut tail = result.output_tail.clone();
        tail.sort();
        assert_eq!(tail, vec!["err", "out"]);
        let log = fs::read_to_string(log_path).unwrap();
        assert!(log.starts_with("HEADER\n"));
        assert!(log.contains("out\n"));
        assert!(log.contains("err\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_command(&sh("frontend-unit", "exit 3", dir.path()));
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.returncode, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_exit_is_negative() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_command(&sh("frontend-e2e", "kill -9 $$", dir.path()));
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.returncode, -9);
    }

    #[test]
    fn test_missing_executable_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("missing.log");
        let request = StepRequest {
            name: "backend".to_string(),
            command: vec!["definitely-not-a-real-binary-7f3a".to_string()],
            cwd: dir.path().to_path_buf(),
            log_path: Some(log_path.clone()),
            quiet: true,
            ..StepRequest::default()
        };

        let result = run_command(&request);

        assert_eq!(result.status, StepStatus::Error);
        assert_eq!(result.returncode, EXIT_NOT_FOUND);
        assert!(result.output_tail[0].contains("definitely-not-a-real-binary-7f3a"));
        assert!(fs::read_to_string(log_path).unwrap().contains("failed to start"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.sh"), "#!/bin/sh\nexit 0\n").unwrap();
        let request = StepRequest {
            name: "backend".to_string(),
            command: vec!["./run.sh".to_string()],
            cwd: dir.path().to_path_buf(),
            quiet: true,
            ..StepRequest::default()
        };

        let result = run_command(&request);

        assert_eq!(result.status, StepStatus::Error);
        assert_eq!(result.returncode, EXIT_NOT_EXECUTABLE);
    }

    #[test]
    fn test_empty_command_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = StepRequest {
            name: "backend".to_string(),
            cwd: dir.path().to_path_buf(),
            quiet: true,
            ..StepRequest::default()
        };
        let result = run_command(&request);
        assert_eq!(result.status, StepStatus::Error);
        assert_eq!(result.returncode, EXIT_LAUNCH_FAILED);
    }

    #[cfg(unix)]
    #[test]
    fn test_tail_keeps_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let script = "i=1; while [ $i -le 100 ]; do echo line-$i; i=$((i+1)); done";
        let result = run_command(&sh("backend", script, dir.path()));
        assert_eq!(result.output_tail.len(), OUTPUT_TAIL_LINES);
        assert_eq!(result.output_tail.first().map(String::as_str), Some("line-61"));
        assert_eq!(result.output_tail.last().map(String::as_str), Some("line-100"));
    }

    #[cfg(unix)]
    #[test]
    fn test_append_and_overwrite_logs() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("suite.log");
        let request = |append_log| StepRequest {
            log_path: Some(log_path.clone()),
            append_log,
            log_header: Some("HEADER\n".to_string()),
            ..sh("backend", "echo body", dir.path())
        };

        run_command(&request(false));
        run_command(&request(true));
        assert_eq!(fs::read_to_string(&log_path).unwrap().matches("HEADER").count(), 2);

        run_command(&request(false));
        assert_eq!(fs::read_to_string(&log_path).unwrap().matches("HEADER").count(), 1);
    }
}
