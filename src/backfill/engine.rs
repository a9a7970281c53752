//! Backfill engine
//!
//! Orchestrates the worker pool over a list of work items: each item is
//! loaded through the run's `BarSource` and inserted through the shared
//! `BarStore` under the run's conflict policy. One item's failure never
//! aborts its siblings; the engine always returns a Summary and never
//! escapes its boundary with an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{BarStore, ConflictPolicy, InsertReport};

use super::pool;
use super::source::{BarSource, WorkItem};
use super::summary::{Summary, TaskError, TaskResult};

/// Per-run engine options, fixed at construction and shared read-only by all
/// workers.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Worker count; keep at or below the database pool size
    pub concurrency: usize,
    pub conflict: ConflictPolicy,
    pub dry_run: bool,
    /// Applied separately to the load and insert steps of each item
    pub task_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            conflict: ConflictPolicy::Fail,
            dry_run: false,
            task_timeout: Duration::from_secs(120),
        }
    }
}

/// Backfill engine over one source and one store.
pub struct Engine<S: BarSource> {
    source: Arc<S>,
    store: Arc<dyn BarStore>,
    options: EngineOptions,
}

impl<S: BarSource + 'static> Engine<S> {
    pub fn new(source: Arc<S>, store: Arc<dyn BarStore>, options: EngineOptions) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    /// Run the engine over the given items.
    ///
    /// Returns after every dispatched task has terminated. A cancellation
    /// signal on `shutdown` stops dispatching; whatever results exist are
    /// still aggregated, and the Summary is flagged partial.
    pub async fn run(&self, items: Vec<WorkItem>, shutdown: &broadcast::Sender<()>) -> Summary {
        let run_id = Uuid::new_v4();
        let wall_start = Instant::now();

        info!(
            "[run {}] dispatching {} item(s), concurrency={}, on-conflict={}{}",
            run_id,
            items.len(),
            self.options.concurrency.max(1),
            self.options.conflict,
            if self.options.dry_run { ", DRY RUN" } else { "" },
        );

        let source = self.source.clone();
        let store = self.store.clone();
        let options = self.options.clone();

        let outcome = pool::run(items, options.concurrency, shutdown, move |item| {
            let source = source.clone();
            let store = store.clone();
            let options = options.clone();
            async move { run_item(&*source, &*store, &options, item).await }
        })
        .await;

        if outcome.cancelled {
            warn!("[run {}] cancelled before the work queue drained", run_id);
        }

        let summary = Summary::from_results(
            outcome.results,
            wall_start.elapsed().as_secs_f64(),
            self.options.dry_run,
            self.options.conflict,
            outcome.cancelled,
        );

        info!("[run {}] summary: {}", run_id, summary.log_line());
        summary
    }
}

/// One item's whole pipeline: load, insert, log.
async fn run_item<S: BarSource>(
    source: &S,
    store: &dyn BarStore,
    options: &EngineOptions,
    item: WorkItem,
) -> TaskResult {
    let label = item.label();
    let started = Instant::now();

    let result = run_pipeline(source, store, options, &item).await;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(report) => {
            info!(
                "[{}] prepared={} inserted={} skipped={} elapsed={:.2}s",
                label, report.prepared, report.inserted, report.skipped, elapsed
            );
            TaskResult {
                label,
                prepared: report.prepared,
                inserted: report.inserted,
                skipped: report.skipped,
                elapsed_secs: elapsed,
                error: None,
            }
        }
        Err(error) => {
            warn!("[{}] failed after {:.2}s: {}", label, elapsed, error);
            TaskResult {
                label,
                prepared: 0,
                inserted: 0,
                skipped: 0,
                elapsed_secs: elapsed,
                error: Some(error),
            }
        }
    }
}

async fn run_pipeline<S: BarSource>(
    source: &S,
    store: &dyn BarStore,
    options: &EngineOptions,
    item: &WorkItem,
) -> Result<InsertReport, TaskError> {
    let timeout_secs = options.task_timeout.as_secs();

    let bars = timeout(options.task_timeout, source.load(item))
        .await
        .map_err(|_| TaskError::Timeout(timeout_secs))??;

    // An empty batch is success, not failure; skip the store round trip.
    if bars.is_empty() {
        return Ok(InsertReport::default());
    }

    let report = timeout(
        options.task_timeout,
        store.insert_bars(&bars, options.conflict, options.dry_run),
    )
    .await
    .map_err(|_| TaskError::Timeout(timeout_secs))??;

    Ok(report)
}
