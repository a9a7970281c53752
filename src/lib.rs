//! # Backfill Manager
//!
//! Bulk historical ingestion of OHLCV price bars into the market data store.
//!
//! ## Features
//!
//! - **Concurrent backfill**: fan a set of tickers out across a bounded
//!   worker pool, fetch bars from the upstream provider, insert under a
//!   conflict policy, and aggregate per-ticker results into a run summary
//! - **CSV injection**: load previously downloaded bar dumps from disk
//!   through the exact same insertion and summary machinery
//! - **Conflict policies**: `fail` (atomic batch, duplicates are an error)
//!   or `ignore` (duplicates skipped and counted)
//! - **Dry runs**: full fetch/parse and duplicate accounting with no writes
//!
//! ## Architecture
//!
//! Work items (tickers or files) flow through a claim-queue worker pool into
//! a `BarSource` (network provider or CSV parser), then into a `BarStore`
//! which owns duplicate detection and transactional insertion. Results are
//! funneled through a single collector into a write-once `Summary`.

pub mod backfill;
pub mod cli;
pub mod config;
pub mod provider;
pub mod schema;
pub mod storage;
pub mod universe;

// Re-export commonly used types
pub use backfill::{Engine, EngineOptions, Summary, TaskError, TaskResult, WorkItem};
pub use config::Settings;
pub use provider::{BarProvider, FmpClient, ProviderError, ProviderResult};
pub use schema::{BarRecord, DateRange, Interval, RangeError};
pub use storage::{BarRepository, BarStore, ConflictPolicy, InsertReport, StorageError};
pub use universe::UniverseSnapshot;
