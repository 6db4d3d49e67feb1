use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::Parser;
use suite_runner_coverage::terminal::Palette;
use suite_runner_orchestrator::{
    LiveProgress, NoProgress, OrchestratorError, ProjectSuites, Progress, RunConfig, SuitesConfig,
    run_with_progress,
};
use tracing::debug;

/// Exit code for a run that could not proceed.
const EXIT_RUN_ERROR: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "run-tests-all-suites")]
#[command(about = "Run the backend, frontend unit and end-to-end test suites")]
#[command(version)]
struct Cli {
    /// Run all suites at once, one worker per suite.
    #[arg(long)]
    parallel: bool,
    /// Stream suite output live, even in parallel mode.
    #[arg(long, conflicts_with = "quiet")]
    verbose: bool,
    /// Only print one status line per suite.
    #[arg(long)]
    quiet: bool,
    /// Re-run only the suites that did not pass in the previous run.
    #[arg(long)]
    resume: bool,
    /// Directory for suite logs and the resume summary
    /// [default: <repo-root>/test-reports].
    #[arg(long)]
    report_dir: Option<PathBuf>,
    /// Repository root holding the suite directories.
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,
    /// YAML file overriding suite directories and commands.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Skip coverage collection and coverage summaries.
    #[arg(long)]
    no_coverage: bool,
}

/// Installs a stderr subscriber when `RUST_LOG` is set; otherwise tracing
/// stays silent so the terminal only shows suite output and the report.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_RUN_ERROR);
        }
    }
}

fn run(cli: Cli) -> Result<i32, OrchestratorError> {
    let repo_root = std::path::absolute(&cli.repo_root)?;
    let mut suites_config = match &cli.config {
        Some(path) => SuitesConfig::load(path)?,
        None => SuitesConfig::default(),
    };
    if cli.no_coverage {
        suites_config.coverage = false;
    }

    let config = RunConfig {
        parallel: cli.parallel,
        verbose: cli.verbose,
        quiet: cli.quiet,
        resume: cli.resume,
        report_dir: cli
            .report_dir
            .map(|dir| repo_root.join(dir))
            .unwrap_or_else(|| RunConfig::new(&repo_root).report_dir),
        repo_root: repo_root.clone(),
    };
    debug!(?config, coverage = suites_config.coverage, "Resolved run configuration");

    let palette = if io::stdout().is_terminal() {
        Palette::ANSI
    } else {
        Palette::PLAIN
    };
    let suites = ProjectSuites::new(&repo_root, suites_config, palette);
    let progress: Box<dyn Progress> = if cli.parallel && !cli.quiet {
        Box::new(LiveProgress::stderr())
    } else {
        Box::new(NoProgress)
    };

    run_with_progress(&config, &suites, progress.as_ref(), &mut io::stdout())
}
