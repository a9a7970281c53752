//! Bar sources
//!
//! One `BarSource` capability covers both ingestion paths: the network
//! provider (items are tickers) and the CSV loader (items are files). The
//! engine and inserter are written once against this seam.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::provider::BarProvider;
use crate::schema::{BarRecord, DateRange};
use crate::universe::UniverseSnapshot;

use super::summary::TaskError;

/// One unit of dispatch to the worker pool.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A ticker to fetch over the run's date range
    Ticker(String),
    /// A CSV file to parse
    File(PathBuf),
}

impl WorkItem {
    /// Short identity used in logs and task results.
    pub fn label(&self) -> String {
        match self {
            WorkItem::Ticker(ticker) => ticker.clone(),
            WorkItem::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

/// Capability to produce a bar batch for one work item.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Fetch or load all bars for the item. An empty batch is a legitimate
    /// outcome, not an error.
    async fn load(&self, item: &WorkItem) -> Result<Vec<BarRecord>, TaskError>;
}

/// Network source: fetches each ticker through the provider and stamps the
/// ticker's exchange from the universe snapshot.
pub struct ProviderSource<P: BarProvider> {
    provider: Arc<P>,
    range: DateRange,
    universe: Arc<UniverseSnapshot>,
    default_exchange: String,
}

impl<P: BarProvider> ProviderSource<P> {
    pub fn new(
        provider: Arc<P>,
        range: DateRange,
        universe: Arc<UniverseSnapshot>,
        default_exchange: &str,
    ) -> Self {
        Self {
            provider,
            range,
            universe,
            default_exchange: default_exchange.to_lowercase(),
        }
    }
}

#[async_trait]
impl<P: BarProvider> BarSource for ProviderSource<P> {
    async fn load(&self, item: &WorkItem) -> Result<Vec<BarRecord>, TaskError> {
        let ticker = match item {
            WorkItem::Ticker(ticker) => ticker,
            WorkItem::File(path) => {
                // Files never reach the provider path by construction.
                return Err(TaskError::Provider(
                    crate::provider::ProviderError::Configuration(format!(
                        "provider source cannot load file {}",
                        path.display()
                    )),
                ));
            }
        };

        let exchange = self
            .universe
            .exchange_for(ticker, &self.default_exchange);

        let mut bars = self.provider.fetch_bars(ticker, &self.range).await?;
        for bar in &mut bars {
            bar.exchange = exchange.clone();
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use crate::schema::Interval;
    use std::collections::HashMap;

    fn range() -> DateRange {
        DateRange::from_compact(Some("010125"), Some("050125"), Interval::Min1).unwrap()
    }

    #[test]
    fn test_work_item_labels() {
        assert_eq!(WorkItem::Ticker("AAPL".into()).label(), "AAPL");
        assert_eq!(
            WorkItem::File(PathBuf::from("/data/dumps/backfill_AAPL.csv")).label(),
            "backfill_AAPL.csv"
        );
    }

    #[tokio::test]
    async fn test_provider_source_stamps_exchange() {
        let universe = UniverseSnapshot::from_parts(
            vec![],
            HashMap::from([("BTCUSD".to_string(), "crypto".to_string())]),
        );
        let source = ProviderSource::new(
            Arc::new(MockProvider::new(3)),
            range(),
            Arc::new(universe),
            "NASDAQ",
        );

        let bars = source
            .load(&WorkItem::Ticker("BTCUSD".into()))
            .await
            .unwrap();
        assert!(bars.iter().all(|b| b.exchange == "crypto"));

        let bars = source
            .load(&WorkItem::Ticker("AAPL".into()))
            .await
            .unwrap();
        assert!(bars.iter().all(|b| b.exchange == "nasdaq"));
    }

    #[tokio::test]
    async fn test_provider_source_rejects_files() {
        let source = ProviderSource::new(
            Arc::new(MockProvider::new(3)),
            range(),
            Arc::new(UniverseSnapshot::default()),
            "nasdaq",
        );
        assert!(source
            .load(&WorkItem::File(PathBuf::from("x.csv")))
            .await
            .is_err());
    }
}
