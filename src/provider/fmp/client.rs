//! FMP REST client

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::FmpSettings;
use crate::provider::{BarProvider, ProviderError, ProviderResult};
use crate::schema::{BarRecord, DateRange};

use super::response::decode_bars;

/// FMP market data client.
///
/// One instance is shared across all workers in a run so the request quota is
/// enforced globally, not per task.
#[derive(Debug)]
pub struct FmpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Exchange stamped onto every record; per-ticker overrides happen in the
    /// source adapter.
    exchange: String,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    max_attempts: u32,
    batch_days: usize,
    request_timeout: Duration,
}

impl FmpClient {
    /// Create a client from settings and an API key.
    pub fn new(settings: &FmpSettings, api_key: String, exchange: &str) -> ProviderResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "FMP API key is missing or empty; set FMP_API_KEY".to_string(),
            ));
        }

        let per_minute = NonZeroU32::new(settings.requests_per_minute.max(1))
            .ok_or_else(|| ProviderError::Configuration("requests_per_minute must be > 0".into()))?;

        let request_timeout = Duration::from_secs(settings.request_timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            exchange: exchange.to_lowercase(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            max_attempts: settings.max_attempts.max(1),
            batch_days: settings.batch_days.max(1),
            request_timeout,
        })
    }

    /// Fetch one business-day batch, with bounded retry on retryable errors.
    async fn fetch_batch(
        &self,
        ticker: &str,
        range: &DateRange,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<BarRecord>> {
        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            self.rate_limiter.until_ready().await;

            match self.request_batch(ticker, range, from, to).await {
                Ok(bars) => return Ok(bars),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "[{}] attempt {}/{} for {}..{} failed: {}",
                        ticker, attempt, self.max_attempts, from, to, e
                    );
                    if let Some(delay) = e.suggested_retry_delay() {
                        sleep(delay).await;
                    }
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // Only reachable when every attempt failed with a retryable error
        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("no attempts made".into())))
    }

    async fn request_batch(
        &self,
        ticker: &str,
        range: &DateRange,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<BarRecord>> {
        let url = format!(
            "{}/historical-chart/{}/{}",
            self.base_url,
            range.interval().as_endpoint_segment(),
            ticker
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("from", from.format("%Y-%m-%d").to_string()),
                ("to", to.format("%Y-%m-%d").to_string()),
                ("apikey", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.request_timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(e, self.request_timeout))?;

        match status {
            StatusCode::OK => decode_bars(&body, ticker, &self.exchange),
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited(format!(
                "HTTP 429 for {}",
                ticker
            ))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::Configuration(
                format!("HTTP {} for {}: check FMP_API_KEY", status.as_u16(), ticker),
            )),
            s => Err(ProviderError::Unavailable(format!(
                "HTTP {} for {}",
                s.as_u16(),
                ticker
            ))),
        }
    }
}

fn classify_transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout.as_secs())
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl BarProvider for FmpClient {
    async fn fetch_bars(&self, ticker: &str, range: &DateRange) -> ProviderResult<Vec<BarRecord>> {
        let days = range.business_days();
        if days.is_empty() {
            debug!("[{}] no trading days in {}", ticker, range);
            return Ok(Vec::new());
        }

        let mut bars = Vec::new();
        for group in days.chunks(self.batch_days) {
            // chunks never yields an empty slice
            let from = group[0];
            let to = group[group.len() - 1];
            let mut batch = self.fetch_batch(ticker, range, from, to).await?;
            debug!("[{}] {} bars for {}..{}", ticker, batch.len(), from, to);
            bars.append(&mut batch);
        }

        // The endpoint returns newest-first; persist and report oldest-first.
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn name(&self) -> &str {
        "fmp"
    }
}
