//! Upstream market data providers
//!
//! The `BarProvider` trait is the seam between the backfill engine and any
//! concrete data vendor. FMP is the production implementation; the mock
//! provider exists for tests and development.

pub mod fmp;
pub mod mock;
mod traits;

pub use fmp::FmpClient;
pub use mock::MockProvider;
pub use traits::{BarProvider, ProviderError, ProviderResult};
