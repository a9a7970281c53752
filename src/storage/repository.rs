//! Postgres bar repository

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::config::DatabaseSettings;
use crate::schema::BarRecord;

use super::{split_batch, BarStore, ConflictPolicy, InsertReport, StorageError, StorageResult};

/// Columns per row in the multi-row INSERT
const INSERT_COLUMNS: usize = 9;

/// Bar repository backed by the `market_bars` table.
pub struct BarRepository {
    pool: PgPool,
    batch_size: usize,
}

impl BarRepository {
    /// Create a repository over an existing pool.
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    /// Connect a new pool from settings.
    ///
    /// Worker count for a run must stay at or below `max_connections`, or
    /// tasks will contend on connection acquisition and time out.
    pub async fn from_settings(
        settings: &DatabaseSettings,
        batch_size: usize,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&settings.url)
            .await?;

        Ok(Self::new(pool, batch_size))
    }

    /// Get the database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the bars table and its uniqueness index if absent.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_bars (
                ticker      TEXT        NOT NULL,
                "timestamp" TIMESTAMPTZ NOT NULL,
                date        DATE        NOT NULL,
                exchange    TEXT        NOT NULL,
                open        NUMERIC     NOT NULL,
                high        NUMERIC     NOT NULL,
                low         NUMERIC     NOT NULL,
                close       NUMERIC     NOT NULL,
                volume      BIGINT      NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS market_bars_ticker_ts_key
            ON market_bars (ticker, "timestamp")
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch the already-present keys for a batch.
    ///
    /// The query over-selects across the cartesian product of tickers and
    /// timestamps; exact pair matching happens in memory.
    async fn existing_keys(
        &self,
        bars: &[BarRecord],
    ) -> StorageResult<HashSet<(String, DateTime<Utc>)>> {
        let mut tickers: Vec<String> = bars.iter().map(|b| b.ticker.clone()).collect();
        tickers.sort();
        tickers.dedup();

        let mut timestamps: Vec<DateTime<Utc>> = bars.iter().map(|b| b.timestamp).collect();
        timestamps.sort();
        timestamps.dedup();

        let rows = sqlx::query(
            r#"
            SELECT ticker, "timestamp"
            FROM market_bars
            WHERE ticker = ANY($1) AND "timestamp" = ANY($2)
            "#,
        )
        .bind(&tickers)
        .bind(&timestamps)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("ticker"), row.get("timestamp")))
            .collect())
    }

    /// Write fresh rows in one transaction, chunked into multi-row INSERTs.
    ///
    /// Returns the number of rows the database actually wrote; under Ignore
    /// this can be lower than `fresh.len()` when a concurrent task wins a
    /// race on the same key.
    async fn write_rows(
        &self,
        fresh: &[&BarRecord],
        policy: ConflictPolicy,
    ) -> StorageResult<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for chunk in fresh.chunks(self.batch_size) {
            let mut query = String::from(
                r#"
                INSERT INTO market_bars (
                    ticker, "timestamp", date, exchange,
                    open, high, low, close, volume
                ) VALUES
                "#,
            );

            let mut param = 1;
            for (i, _) in chunk.iter().enumerate() {
                if i > 0 {
                    query.push_str(", ");
                }
                query.push('(');
                for col in 0..INSERT_COLUMNS {
                    if col > 0 {
                        query.push_str(", ");
                    }
                    query.push_str(&format!("${}", param));
                    param += 1;
                }
                query.push(')');
            }

            if policy == ConflictPolicy::Ignore {
                query.push_str(r#" ON CONFLICT (ticker, "timestamp") DO NOTHING"#);
            }

            let mut sqlx_query = sqlx::query(&query);
            for bar in chunk {
                sqlx_query = sqlx_query
                    .bind(&bar.ticker)
                    .bind(bar.timestamp)
                    .bind(bar.date())
                    .bind(&bar.exchange)
                    .bind(bar.open)
                    .bind(bar.high)
                    .bind(bar.low)
                    .bind(bar.close)
                    .bind(bar.volume);
            }

            let result = sqlx_query.execute(&mut *tx).await.map_err(|e| {
                if is_unique_violation(&e) {
                    // Lost a race under Fail after the pre-check passed; the
                    // transaction rolls back so the batch stays atomic.
                    StorageError::DuplicateKey {
                        count: 1,
                        example: chunk
                            .first()
                            .map(|b| b.ticker.clone())
                            .unwrap_or_default(),
                    }
                } else {
                    StorageError::Database(e)
                }
            })?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[async_trait]
impl BarStore for BarRepository {
    async fn insert_bars(
        &self,
        bars: &[BarRecord],
        policy: ConflictPolicy,
        dry_run: bool,
    ) -> StorageResult<InsertReport> {
        if bars.is_empty() {
            return Ok(InsertReport::default());
        }

        let existing = self.existing_keys(bars).await?;
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

        if dry_run {
            return Ok(InsertReport {
                prepared: bars.len(),
                inserted: fresh.len(),
                skipped: collisions,
            });
        }

        let inserted = self.write_rows(&fresh, policy).await?;
        debug!(
            "wrote {} of {} prepared rows ({} collisions)",
            inserted,
            bars.len(),
            collisions
        );

        Ok(InsertReport {
            prepared: bars.len(),
            // Race-lost rows under Ignore surface as skipped, not inserted
            inserted,
            skipped: bars.len() - inserted,
        })
    }
}
