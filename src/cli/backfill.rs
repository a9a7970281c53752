//! Network backfill commands (`specific` and `concurrent`)

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::backfill::{Engine, EngineOptions, ProviderSource, Summary, WorkItem};
use crate::config::Settings;
use crate::provider::FmpClient;
use crate::schema::{DateRange, Interval};
use crate::storage::BarRepository;
use crate::universe::UniverseSnapshot;

use super::{SharedArgs, EXIT_VALIDATION};

/// Arguments for the sequential backfill command
#[derive(Args, Debug)]
pub struct BackfillArgs {
    #[command(flatten)]
    pub shared: SharedArgs,
}

/// Arguments for the concurrent backfill command
#[derive(Args, Debug)]
pub struct ConcurrentArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Max worker tasks (cap to the DB pool size)
    #[arg(long)]
    pub threads: Option<usize>,
}

/// Execute the sequential command: a pool of one.
pub async fn execute_specific(args: BackfillArgs) -> Result<()> {
    run_backfill(args.shared, Some(1)).await
}

/// Execute the concurrent command.
pub async fn execute_concurrent(args: ConcurrentArgs) -> Result<()> {
    run_backfill(args.shared, args.threads).await
}

async fn run_backfill(shared: SharedArgs, requested_threads: Option<usize>) -> Result<()> {
    // Pre-run validation: abort with exit code 2 before any task dispatch.
    let (range, _) = validate_range(&shared);

    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());
    let concurrency = requested_threads.unwrap_or(settings.engine.concurrent_threads);

    let universe = match UniverseSnapshot::load(&settings.universe) {
        Ok(u) => u,
        Err(e) => {
            error!("failed to load ticker universe: {}", e);
            process::exit(EXIT_VALIDATION);
        }
    };
    let tickers = match universe.resolve_tickers(&shared.tickers, settings.universe.fallback_limit)
    {
        Ok(t) => t,
        Err(e) => {
            error!("{}", e);
            process::exit(EXIT_VALIDATION);
        }
    };

    if concurrency > settings.database.max_connections as usize {
        warn!(
            "worker count {} exceeds the database pool size {}; tasks will contend for connections",
            concurrency, settings.database.max_connections
        );
    }

    info!(
        "backfilling {} ticker(s), range {}, exchange default {}",
        tickers.len(),
        range,
        shared.exchange
    );

    // API key is resolved here, not in the provider, so a missing key fails
    // fast before the pool connects.
    let api_key = std::env::var("FMP_API_KEY").unwrap_or_default();
    let provider = FmpClient::new(&settings.provider.fmp, api_key, &shared.exchange)
        .context("FMP provider setup failed")?;

    let repository = Arc::new(
        BarRepository::from_settings(&settings.database, settings.storage.batch_insert_size)
            .await
            .context("database connection failed")?,
    );
    repository
        .ensure_schema()
        .await
        .context("schema setup failed")?;

    let source = ProviderSource::new(
        Arc::new(provider),
        range,
        Arc::new(universe),
        &shared.exchange,
    );
    let engine = Engine::new(
        Arc::new(source),
        repository,
        EngineOptions {
            concurrency,
            conflict: shared.on_conflict,
            dry_run: shared.dry_run,
            task_timeout: std::time::Duration::from_secs(settings.engine.task_timeout_secs),
        },
    );

    let items: Vec<WorkItem> = tickers.into_iter().map(WorkItem::Ticker).collect();
    let shutdown = spawn_interrupt_handler();

    let summary = engine.run(items, &shutdown).await;
    report(&summary);

    Ok(())
}

/// Parse and validate the date range, exiting with code 2 on failure.
pub(super) fn validate_range(shared: &SharedArgs) -> (DateRange, Interval) {
    let interval = match Interval::try_from(shared.interval) {
        Ok(i) => i,
        Err(e) => {
            error!("{}", e);
            process::exit(EXIT_VALIDATION);
        }
    };

    match DateRange::from_compact(shared.start.as_deref(), shared.end.as_deref(), interval) {
        Ok(range) => (range, interval),
        Err(e) => {
            error!("{}", e);
            process::exit(EXIT_VALIDATION);
        }
    }
}

/// Wire operator interrupts into the engine's cancellation channel.
pub(super) fn spawn_interrupt_handler() -> broadcast::Sender<()> {
    let (shutdown, _) = broadcast::channel(1);
    let sender = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight tasks");
            let _ = sender.send(());
        }
    });
    shutdown
}

/// Log per-failure details after the summary line.
pub(super) fn report(summary: &Summary) {
    for failure in &summary.failures {
        warn!(
            "failed item {}: {}",
            failure.label,
            failure
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default()
        );
    }
    if summary.has_failures() {
        warn!(
            "{} of {} item(s) failed; see the lines above",
            summary.failures.len(),
            summary.items
        );
    }
}
