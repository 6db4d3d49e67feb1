//! Live progress display for parallel runs.

use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use suite_runner_core::{StepStatus, Suite};

/// Receives suite transitions while a parallel run is in flight.
pub trait Progress: Sync {
    fn start(&self, suites: &[Suite]);
    fn mark_done(&self, name: &str, status: StepStatus, duration: Duration);
    fn finish(&self);
}

/// Discards every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _suites: &[Suite]) {}
    fn mark_done(&self, _name: &str, _status: StepStatus, _duration: Duration) {}
    fn finish(&self) {}
}

/// Writes one line per transition.
pub struct LiveProgress<W> {
    state: Mutex<LiveState<W>>,
}

struct LiveState<W> {
    out: W,
    started: Option<Instant>,
    total: usize,
    done: usize,
}

impl LiveProgress<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> LiveProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(LiveState {
                out,
                started: None,
                total: 0,
                done: 0,
            }),
        }
    }

    pub fn into_inner(self) -> W {
        match self.state.into_inner() {
            Ok(state) => state.out,
            Err(poisoned) => poisoned.into_inner().out,
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut LiveState<W>)) {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}

impl<W: Write + Send> Progress for LiveProgress<W> {
    fn start(&self, suites: &[Suite]) {
        self.with_state(|state| {
            state.started = Some(Instant::now());
            state.total = suites.len();
            state.done = 0;
            let names: Vec<&str> = suites.iter().map(|suite| suite.name()).collect();
            let _ = writeln!(
                state.out,
                "Running {} suites in parallel: {}",
                suites.len(),
                names.join(", ")
            );
        });
    }

    fn mark_done(&self, name: &str, status: StepStatus, duration: Duration) {
        self.with_state(|state| {
            state.done += 1;
            let mark = match status {
                StepStatus::Ok | StepStatus::Skipped => "done",
                StepStatus::Failed | StepStatus::Error => "FAILED",
            };
            let _ = writeln!(
                state.out,
                "  [{}/{}] {name} {mark} ({status}, {:.1}s)",
                state.done,
                state.total,
                duration.as_secs_f64()
            );
        });
    }

    fn finish(&self) {
        self.with_state(|state| {
            let elapsed = state.started.map(|started| started.elapsed()).unwrap_or_default();
            let _ = writeln!(
                state.out,
                "{}/{} suites finished in {:.1}s",
                state.done,
                state.total,
                elapsed.as_secs_f64()
            );
            let _ = state.out.flush();
        });
    }
}
