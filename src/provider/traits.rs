//! Provider trait definitions

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::{BarRecord, DateRange};

/// Provider error types
///
/// Callers distinguish retryable from terminal failures through
/// [`ProviderError::is_retryable`]; the engine itself never retries, so any
/// retry policy layers on top of this interface without changing it.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Whether a retry of the same request could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_)
                | ProviderError::Unavailable(_)
                | ProviderError::Timeout(_)
        )
    }

    /// Suggested delay before retrying, if applicable.
    pub fn suggested_retry_delay(&self) -> Option<std::time::Duration> {
        match self {
            ProviderError::RateLimited(_) => Some(std::time::Duration::from_secs(10)),
            ProviderError::Unavailable(_) => Some(std::time::Duration::from_secs(2)),
            ProviderError::Timeout(_) => Some(std::time::Duration::from_secs(1)),
            _ => None,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for historical bar providers.
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// Fetch all bars for one ticker over the given range.
    ///
    /// An empty vector is a legitimate outcome (the provider has no data for
    /// that ticker/interval), not an error.
    async fn fetch_bars(&self, ticker: &str, range: &DateRange) -> ProviderResult<Vec<BarRecord>>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}
