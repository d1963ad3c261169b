//! Results collector service.
//!
//! Accepts published benchmark batches and serves them back together with
//! running per-test totals.
//!
//! Run: `cargo run --bin results-collector -- --bind 0.0.0.0:5000`

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fetch_benchmarks::collector::{router, BatchCache};
use fetch_benchmarks::config::CollectorConfig;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Collect and aggregate published fetch benchmark results
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    collector: CollectorConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.collector;
    let retention = config.retention();
    let cache = BatchCache::open(&config.cache_dir)
        .await
        .with_context(|| format!("failed to open cache in {}", config.cache_dir.display()))?
        .with_retention(retention);

    let app = router(Arc::new(cache));
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(addr = %config.bind, ?retention, "collector listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
