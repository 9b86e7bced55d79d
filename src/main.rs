//! env-collector: scheduled environmental readings for a fixed set of
//! locations.
//!
//! One invocation is one collection pass for one metric family:
//! 1. Fetches the reading for every location (with retries)
//! 2. Maps and validates it into a snapshot
//! 3. Archives the snapshot
//! 4. Merges it into the location's cache record with history and analytics
//!
//! Scheduling is left to the caller (cron, a job runner, ...).

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

use collector::{CacheMerger, CollectionRun, PressureAnalyzer, Reading, RunReport};
use common::config::FamilyConfig;
use common::CollectorConfig;
use doc_store::{DocumentStore, FileStore, MemoryStore};
use google_client::{
    Fetcher, GoogleApiClient, IntoSnapshot, PollenFetcher, RetryPolicy, RetryingFetcher,
    WeatherFetcher,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Family {
    /// Current conditions with pressure deltas and trend.
    Weather,
    /// Daily pollen index.
    Pollen,
}

/// Environmental data collector
#[derive(Parser)]
#[command(name = "env-collector", about = "Collect weather and pollen readings")]
struct Cli {
    /// Metric family to collect.
    #[arg(value_enum)]
    family: Family,

    /// Config file (defaults to ./config.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the document store directory.
    #[arg(long)]
    store_dir: Option<String>,

    /// Keep everything in memory; nothing is written to disk.
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    let debug = std::env::var("DEBUG")
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let fallback = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with_target(true)
        .init();
}

async fn run_family<F>(
    fetcher: F,
    store: Arc<dyn DocumentStore>,
    cfg: &CollectorConfig,
    family: &FamilyConfig,
) -> RunReport
where
    F: Fetcher,
    F::Raw: IntoSnapshot,
    <F::Raw as IntoSnapshot>::Snapshot: Reading,
{
    let merger = CacheMerger::new(
        store.clone(),
        family.cache_collection.clone(),
        family.history_cap,
        cfg.store.transaction_attempts,
        PressureAnalyzer::from_config(&cfg.analytics),
    );

    CollectionRun::new(
        fetcher,
        store,
        merger,
        family.raw_collection.clone(),
        cfg.locations.clone(),
    )
    .with_concurrency(cfg.concurrency)
    .run()
    .await
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let cfg = match config::load_config(cli.config.as_deref(), cli.store_dir.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        family = ?cli.family,
        locations = ?cfg.locations.iter().map(|l| &l.id).collect::<Vec<_>>(),
        dry_run = cli.dry_run,
        "env-collector starting"
    );

    let store: Arc<dyn DocumentStore> = if cli.dry_run {
        Arc::new(MemoryStore::new())
    } else {
        info!(dir = %cfg.store.dir, "Using file store");
        Arc::new(FileStore::new(&cfg.store.dir))
    };

    let api = match GoogleApiClient::new(&cfg.api_key, cfg.retry.request_timeout()) {
        Ok(api) => api,
        Err(e) => {
            error!("Failed to build API client: {}", e);
            std::process::exit(1);
        }
    };
    let policy = RetryPolicy::new(cfg.retry.backoffs());

    let report = match cli.family {
        Family::Weather => {
            let fetcher = RetryingFetcher::new(
                WeatherFetcher::new(api, &cfg.weather.base_url),
                policy,
            );
            run_family(fetcher, store, &cfg, &cfg.weather).await
        }
        Family::Pollen => {
            let fetcher = RetryingFetcher::new(
                PollenFetcher::new(api, &cfg.pollen.base_url),
                policy,
            );
            run_family(fetcher, store, &cfg, &cfg.pollen).await
        }
    };

    if !report.is_success() {
        error!(
            failed = report.failed.len(),
            "No location was collected successfully"
        );
        std::process::exit(1);
    }
}
