//! Financial Modeling Prep data provider
//!
//! Fetches intraday OHLCV bars from the FMP REST API. Requests are grouped
//! over business days to bound payload size, rate-limited across all workers
//! through a shared quota, and retried a bounded number of times on
//! retryable failures.

mod client;
mod response;

pub use client::FmpClient;
pub use response::FmpBar;
