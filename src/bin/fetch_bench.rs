//! Fetch benchmark session driver.
//!
//! Stages every artifact in `ACIS` with the reference binary, then times the
//! official and patched binaries in a fresh tmpfs per test case, prints a
//! ranked summary and publishes it to `RESULT_URL` when set.
//!
//! Run (as root): `RKT_PATCHED=./rkt ACIS=coreos.com/etcd:v3.1.7 cargo run --bin fetch-bench`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fetch_benchmarks::config::SessionConfig;
use fetch_benchmarks::process::{SystemClock, SystemProcess};
use fetch_benchmarks::publish::{publish, PublishOutcome};
use fetch_benchmarks::report::{print_case, print_summary};
use fetch_benchmarks::runner::Session;
use fetch_benchmarks::stager::ArtifactStager;
use fetch_benchmarks::workspace::{IsolatedWorkspace, SystemMount};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Compare fetch performance of an official and a patched binary
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    session: SessionConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {e}");
    }

    match run(cli.session) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            print_summary(&[]);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every test case succeeded.
fn run(config: SessionConfig) -> Result<bool> {
    config.validate().context("session precondition failed")?;

    let workspace = IsolatedWorkspace::new(SystemMount, &config.workspace, config.workspace_size.clone());
    let stager = ArtifactStager::new(&config.reference_binary, &config.workspace, &config.artifact_cache);
    let mut session = Session::new(workspace, stager, SystemProcess, SystemClock::new())
        .with_profile(config.fetch_profile())
        .with_policy(config.pass_failure_policy());

    for case in config.test_cases()? {
        session.register(case)?;
    }

    let artifacts = config.artifacts();
    info!(count = artifacts.len(), "staging artifacts");
    session.prepare(&artifacts).context("failed to stage artifacts")?;

    let outcome = session.run_all(print_case);
    print_summary(&outcome.results);

    match publish(&outcome.results, config.result_url.as_deref()) {
        PublishOutcome::Skipped => {}
        PublishOutcome::Responded { status } => {
            println!();
            println!("{}: {}", config.result_url.as_deref().unwrap_or_default(), status);
        }
        PublishOutcome::Failed(reason) => {
            println!();
            println!("results not published: {}", reason);
        }
    }

    for failure in &outcome.failures {
        error!(case = %failure.name, error = %failure.error, "test case did not produce a result");
    }
    Ok(outcome.failures.is_empty())
}
