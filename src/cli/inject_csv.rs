//! CSV injection command

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{error, info};

use crate::backfill::{list_csv_files, CsvSource, Engine, EngineOptions, WorkItem};
use crate::config::Settings;
use crate::storage::BarRepository;

use super::backfill::{report, spawn_interrupt_handler, validate_range};
use super::{SharedArgs, EXIT_VALIDATION};

/// Arguments for the inject-csv command
#[derive(Args, Debug)]
pub struct InjectCsvArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Directory containing CSV dumps
    #[arg(long)]
    pub csv_dir: PathBuf,

    /// Worker tasks for file ingestion
    #[arg(long)]
    pub threads: Option<usize>,
}

/// Execute the inject-csv command.
pub async fn execute(args: InjectCsvArgs) -> Result<()> {
    // The date range is only a row filter here; apply it when given.
    let filter = if args.shared.start.is_some() || args.shared.end.is_some() {
        Some(validate_range(&args.shared).0)
    } else {
        None
    };

    if !args.csv_dir.is_dir() {
        error!("directory not found: {}", args.csv_dir.display());
        process::exit(EXIT_VALIDATION);
    }

    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());
    let threads = args.threads.unwrap_or(settings.engine.csv_threads);

    let files = list_csv_files(&args.csv_dir).context("could not list CSV directory")?;
    if files.is_empty() {
        info!("no CSV files in {}; nothing to do", args.csv_dir.display());
        return Ok(());
    }

    info!(
        "injecting {} file(s) from {} using {} worker(s)",
        files.len(),
        args.csv_dir.display(),
        threads
    );

    let repository = Arc::new(
        BarRepository::from_settings(&settings.database, settings.storage.batch_insert_size)
            .await
            .context("database connection failed")?,
    );
    repository
        .ensure_schema()
        .await
        .context("schema setup failed")?;

    let source = CsvSource::new(filter, &args.shared.exchange);
    let engine = Engine::new(
        Arc::new(source),
        repository,
        EngineOptions {
            concurrency: threads,
            conflict: args.shared.on_conflict,
            dry_run: args.shared.dry_run,
            task_timeout: std::time::Duration::from_secs(settings.engine.task_timeout_secs),
        },
    );

    let items: Vec<WorkItem> = files.into_iter().map(WorkItem::File).collect();
    let shutdown = spawn_interrupt_handler();

    let summary = engine.run(items, &shutdown).await;
    report(&summary);

    Ok(())
}
