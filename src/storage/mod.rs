//! Bar persistence
//!
//! The `BarStore` trait is the insertion seam shared by the network and CSV
//! ingestion paths. Duplicate detection is owned by the store itself (key
//! pre-check plus in-batch dedup) so conflict semantics do not silently
//! depend on a database constraint the operator might have forgotten to
//! create.

mod memory;
mod repository;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::schema::BarRecord;

pub use memory::MemoryBarStore;
pub use repository::BarRepository;

/// How duplicate `(ticker, timestamp)` rows are handled on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConflictPolicy {
    /// Any duplicate fails the whole batch; nothing is written
    Fail,
    /// Duplicates are excluded from the write and counted as skipped
    Ignore,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::Fail => write!(f, "fail"),
            ConflictPolicy::Ignore => write!(f, "ignore"),
        }
    }
}

/// Storage errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    #[error("duplicate key: {count} row(s) already present (e.g. {example})")]
    DuplicateKey { count: usize, example: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Counts produced by one batch insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Rows handed to the store
    pub prepared: usize,
    /// Rows durably written (or that would be written, under dry-run)
    pub inserted: usize,
    /// Rows excluded as uniqueness collisions
    pub skipped: usize,
}

/// Persistence seam for bar batches.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Insert a batch under the given conflict policy.
    ///
    /// Under `Fail` the batch is atomic: a single collision fails the whole
    /// call with [`StorageError::DuplicateKey`] and nothing is written. Under
    /// `Ignore` collisions are counted as skipped, never surfaced as errors.
    /// With `dry_run` the store performs only its read-only duplicate check
    /// and reports the counts the write would have produced.
    async fn insert_bars(
        &self,
        bars: &[BarRecord],
        policy: ConflictPolicy,
        dry_run: bool,
    ) -> StorageResult<InsertReport>;
}

/// Split a batch into fresh rows and collision count against a set of
/// existing keys. Repeats of one key inside the batch count as collisions
/// from the second occurrence on.
pub(crate) fn split_batch<'a>(
    bars: &'a [BarRecord],
    existing: &HashSet<(String, DateTime<Utc>)>,
) -> (Vec<&'a BarRecord>, usize) {
    let mut seen: HashSet<(String, DateTime<Utc>)> = HashSet::with_capacity(bars.len());
    let mut fresh = Vec::with_capacity(bars.len());
    let mut collisions = 0;

    for bar in bars {
        let key = bar.key();
        if existing.contains(&key) || !seen.insert(key) {
            collisions += 1;
        } else {
            fresh.push(bar);
        }
    }

    (fresh, collisions)
}
