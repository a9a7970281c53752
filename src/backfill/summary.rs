//! Per-task results and the run summary

use thiserror::Error;

use crate::provider::ProviderError;
use crate::storage::{ConflictPolicy, StorageError};

use super::csv_loader::CsvError;

/// Error captured for one work item.
///
/// A task error never aborts sibling tasks; it is carried on the item's
/// [`TaskResult`] and surfaces in [`Summary::failures`].
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Parse(#[from] CsvError),

    #[error("task timed out after {0}s")]
    Timeout(u64),
}

/// Outcome of one work item.
#[derive(Debug)]
pub struct TaskResult {
    /// Ticker or file name
    pub label: String,
    /// Rows fetched or parsed for the item
    pub prepared: usize,
    /// Rows durably written (or that would be, under dry-run)
    pub inserted: usize,
    /// Rows excluded as uniqueness collisions
    pub skipped: usize,
    /// Wall time for the item's whole pipeline
    pub elapsed_secs: f64,
    pub error: Option<TaskError>,
}

impl TaskResult {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Write-once aggregate over all task results of a run.
///
/// Built only after every dispatched task has terminated; sums do not depend
/// on completion order.
#[derive(Debug)]
pub struct Summary {
    /// Number of work items dispatched
    pub items: usize,
    pub prepared: usize,
    pub inserted: usize,
    pub skipped: usize,
    /// Run wall time in seconds
    pub elapsed_secs: f64,
    /// All task results with a captured error
    pub failures: Vec<TaskResult>,
    pub dry_run: bool,
    pub conflict: ConflictPolicy,
    /// True when the run was cancelled before the queue drained
    pub partial: bool,
}

impl Summary {
    /// Fold completed task results into a summary.
    pub fn from_results(
        results: Vec<TaskResult>,
        elapsed_secs: f64,
        dry_run: bool,
        conflict: ConflictPolicy,
        partial: bool,
    ) -> Self {
        let mut summary = Summary {
            items: results.len(),
            prepared: 0,
            inserted: 0,
            skipped: 0,
            elapsed_secs,
            failures: Vec::new(),
            dry_run,
            conflict,
            partial,
        };

        for result in results {
            summary.prepared += result.prepared;
            summary.inserted += result.inserted;
            summary.skipped += result.skipped;
            if result.is_failure() {
                summary.failures.push(result);
            }
        }

        summary
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Human-oriented one-line rendering, with explicit markers so dry-run
    /// counts are not mistaken for committed writes and "skipped" under
    /// ignore is not mistaken for zero duplicates.
    pub fn log_line(&self) -> String {
        let mut line = format!(
            "items={} prepared={} inserted={} skipped={} failures={} elapsed={:.2}s",
            self.items,
            self.prepared,
            self.inserted,
            self.skipped,
            self.failures.len(),
            self.elapsed_secs,
        );
        if self.conflict == ConflictPolicy::Ignore {
            line.push_str(" on-conflict=ignore");
        }
        if self.dry_run {
            line.push_str(" [DRY RUN - nothing written]");
        }
        if self.partial {
            line.push_str(" [PARTIAL - run cancelled]");
        }
        line
    }
}
