//! Mock bar provider for testing
//!
//! Provides a scriptable implementation of [`BarProvider`] for use in tests
//! and development: per-ticker outcomes (generated bars, an empty result, or
//! a specific error) plus an optional artificial delay.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::provider::{BarProvider, ProviderError, ProviderResult};
use crate::schema::{BarRecord, DateRange};

/// Scripted outcome for one ticker
pub enum MockOutcome {
    /// Generate this many bars spread over the range
    Bars(usize),
    /// Legitimate empty result
    Empty,
    /// Fail with the given error
    Fail(fn() -> ProviderError),
}

/// Mock bar provider
pub struct MockProvider {
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    /// Outcome for tickers with no explicit script
    pub default_bars: usize,
    /// Base price for generated data
    pub base_price: Decimal,
    /// Artificial latency per fetch
    pub delay: Option<Duration>,
    exchange: String,
}

impl MockProvider {
    /// Create a provider that generates `default_bars` bars per ticker.
    pub fn new(default_bars: usize) -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            default_bars,
            base_price: Decimal::from(100),
            delay: None,
            exchange: "mock".to_string(),
        }
    }

    /// Script an outcome for a specific ticker.
    pub fn script(self, ticker: &str, outcome: MockOutcome) -> Self {
        self.outcomes.lock().insert(ticker.to_uppercase(), outcome);
        self
    }

    /// Add a fixed delay to every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Generate `count` bars for a ticker, one interval apart from the range
    /// start, with a simple alternating price walk.
    pub fn generate_bars(&self, ticker: &str, range: &DateRange, count: usize) -> Vec<BarRecord> {
        let step = ChronoDuration::minutes(range.interval().minutes() as i64);
        let mut bars = Vec::with_capacity(count);
        let mut price = self.base_price;

        for i in 0..count {
            let delta = if i % 2 == 0 {
                Decimal::ONE
            } else {
                -Decimal::ONE
            };
            price += delta;

            bars.push(BarRecord {
                ticker: ticker.to_uppercase(),
                timestamp: range.start_datetime() + step * i as i32,
                exchange: self.exchange.clone(),
                open: price,
                high: price + Decimal::ONE,
                low: price - Decimal::ONE,
                close: price,
                volume: (i as i64 % 100) + 1,
            });
        }

        bars
    }
}

#[async_trait]
impl BarProvider for MockProvider {
    async fn fetch_bars(&self, ticker: &str, range: &DateRange) -> ProviderResult<Vec<BarRecord>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let count = {
            let outcomes = self.outcomes.lock();
            match outcomes.get(&ticker.to_uppercase()) {
                Some(MockOutcome::Bars(n)) => *n,
                Some(MockOutcome::Empty) => return Ok(Vec::new()),
                Some(MockOutcome::Fail(make)) => return Err(make()),
                None => self.default_bars,
            }
        };

        Ok(self.generate_bars(ticker, range, count))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Interval;

    fn range() -> DateRange {
        DateRange::from_compact(Some("010125"), Some("050125"), Interval::Min1).unwrap()
    }

    #[tokio::test]
    async fn test_default_generation() {
        let provider = MockProvider::new(10);
        let bars = provider.fetch_bars("AAPL", &range()).await.unwrap();
        assert_eq!(bars.len(), 10);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(bars.iter().all(|b| b.ticker == "AAPL"));
    }

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let provider = MockProvider::new(10)
            .script("EMPTY", MockOutcome::Empty)
            .script("BROKEN", MockOutcome::Fail(|| {
                ProviderError::Unavailable("scripted".into())
            }));

        assert!(provider.fetch_bars("EMPTY", &range()).await.unwrap().is_empty());
        assert!(provider.fetch_bars("BROKEN", &range()).await.is_err());
        assert_eq!(provider.fetch_bars("OTHER", &range()).await.unwrap().len(), 10);
    }
}
