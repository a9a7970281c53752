//! Concurrent backfill engine
//!
//! Work items (tickers or CSV files) are fanned out across a bounded worker
//! pool; each worker runs one item's load → insert pipeline and reports a
//! `TaskResult` to a single collector. After every dispatched task has
//! terminated, the results are folded into a write-once `Summary`.

mod csv_loader;
mod engine;
mod pool;
mod source;
mod summary;

pub use csv_loader::{list_csv_files, CsvError, CsvSource};
pub use engine::{Engine, EngineOptions};
pub use source::{BarSource, ProviderSource, WorkItem};
pub use summary::{Summary, TaskError, TaskResult};
