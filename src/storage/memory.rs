//! In-memory bar store
//!
//! Implements the exact conflict and dry-run semantics of the Postgres
//! repository over an in-process map. Used by tests and development runs;
//! it is the reference implementation of "duplicate detection without a
//! database constraint".

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::schema::BarRecord;

use super::{split_batch, BarStore, ConflictPolicy, InsertReport, StorageError, StorageResult};

/// In-memory bar store keyed by `(ticker, timestamp)`.
#[derive(Default)]
pub struct MemoryBarStore {
    rows: Mutex<HashMap<(String, DateTime<Utc>), BarRecord>>,
}

impl MemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted rows.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Persisted rows for one ticker, oldest first.
    pub fn rows_for(&self, ticker: &str) -> Vec<BarRecord> {
        let mut rows: Vec<BarRecord> = self
            .rows
            .lock()
            .values()
            .filter(|b| b.ticker == ticker)
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.timestamp);
        rows
    }
}

#[async_trait]
impl BarStore for MemoryBarStore {
    async fn insert_bars(
        &self,
        bars: &[BarRecord],
        policy: ConflictPolicy,
        dry_run: bool,
    ) -> StorageResult<InsertReport> {
        if bars.is_empty() {
            return Ok(InsertReport::default());
        }

        // Hold the lock for the whole call so the batch is atomic with
        // respect to sibling tasks, like the repository's transaction.
        let mut rows = self.rows.lock();
        let existing = rows.keys().cloned().collect();
        let (fresh, collisions) = split_batch(bars, &existing);

        if policy == ConflictPolicy::Fail && collisions > 0 {
            let example = bars
                .iter()
                .find(|b| existing.contains(&b.key()))
                .map(|b| format!("{}@{}", b.ticker, b.timestamp))
                .unwrap_or_else(|| "in-batch duplicate".to_string());
            return Err(StorageError::DuplicateKey {
                count: collisions,
                example,
            });
        }

        let report = InsertReport {
            prepared: bars.len(),
            inserted: fresh.len(),
            skipped: collisions,
        };

        if !dry_run {
            for bar in fresh {
                rows.insert(bar.key(), bar.clone());
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn bar(ticker: &str, minute: u32) -> BarRecord {
        BarRecord {
            ticker: ticker.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 10, minute, 0).unwrap(),
            exchange: "nasdaq".to_string(),
            open: Decimal::from(10),
            high: Decimal::from(11),
            low: Decimal::from(9),
            close: Decimal::from(10),
            volume: 100,
        }
    }

    #[tokio::test]
    async fn test_insert_and_skip_under_ignore() {
        let store = MemoryBarStore::new();
        let batch = vec![bar("A", 0), bar("A", 1)];

        let first = store
            .insert_bars(&batch, ConflictPolicy::Ignore, false)
            .await
            .unwrap();
        assert_eq!(first, InsertReport { prepared: 2, inserted: 2, skipped: 0 });

        let second = store
            .insert_bars(&batch, ConflictPolicy::Ignore, false)
            .await
            .unwrap();
        assert_eq!(second, InsertReport { prepared: 2, inserted: 0, skipped: 2 });
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_policy_is_atomic() {
        let store = MemoryBarStore::new();
        store
            .insert_bars(&[bar("A", 0)], ConflictPolicy::Ignore, false)
            .await
            .unwrap();

        // One collision in a batch of three: nothing gets written
        let batch = vec![bar("A", 0), bar("A", 1), bar("A", 2)];
        let err = store
            .insert_bars(&batch, ConflictPolicy::Fail, false)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { count: 1, .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let store = MemoryBarStore::new();
        store
            .insert_bars(&[bar("A", 0)], ConflictPolicy::Ignore, false)
            .await
            .unwrap();

        let batch = vec![bar("A", 0), bar("A", 1)];
        let report = store
            .insert_bars(&batch, ConflictPolicy::Ignore, true)
            .await
            .unwrap();
        assert_eq!(report, InsertReport { prepared: 2, inserted: 1, skipped: 1 });
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let store = MemoryBarStore::new();
        let report = store
            .insert_bars(&[], ConflictPolicy::Fail, false)
            .await
            .unwrap();
        assert_eq!(report, InsertReport::default());
    }
}
