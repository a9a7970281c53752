//! Ticker universe snapshot
//!
//! The universe (which tickers exist, and which exchange each belongs to) is
//! maintained by an external refresh job as plain JSON array files. This
//! module loads those files once, at run start, into an immutable snapshot
//! that workers read without synchronization. The snapshot is never refreshed
//! mid-run.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::UniverseSettings;

/// Universe loading errors
#[derive(Error, Debug)]
pub enum UniverseError {
    #[error("could not read universe file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid JSON in universe file {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("no tickers given and no universe file configured")]
    NoTickers,
}

/// Immutable snapshot of the ticker universe for one run.
#[derive(Debug, Clone, Default)]
pub struct UniverseSnapshot {
    /// Fallback tickers, used when the caller passes none explicitly
    tickers: Vec<String>,
    /// Ticker -> exchange classification
    exchanges: HashMap<String, String>,
}

impl UniverseSnapshot {
    /// Load the snapshot described by the settings.
    ///
    /// A missing exchange-list file is logged and skipped so that one stale
    /// path does not block a run; the fallback tickers file is only required
    /// when it is actually consulted.
    pub fn load(settings: &UniverseSettings) -> Result<Self, UniverseError> {
        let tickers = match &settings.tickers_path {
            Some(path) => read_ticker_array(Path::new(path))?,
            None => Vec::new(),
        };

        let mut exchanges = HashMap::new();
        for (exchange, path) in &settings.exchange_lists {
            match read_ticker_array(Path::new(path)) {
                Ok(list) => {
                    debug!("loaded {} tickers for exchange {}", list.len(), exchange);
                    for ticker in list {
                        exchanges.entry(ticker).or_insert_with(|| exchange.clone());
                    }
                }
                Err(e) => warn!("skipping exchange list {}: {}", exchange, e),
            }
        }

        Ok(Self { tickers, exchanges })
    }

    /// Build a snapshot directly from in-memory lists.
    pub fn from_parts(tickers: Vec<String>, exchanges: HashMap<String, String>) -> Self {
        Self {
            tickers: tickers.into_iter().map(|t| t.to_uppercase()).collect(),
            exchanges,
        }
    }

    /// Resolve the run tickers: explicit arguments win, otherwise the first
    /// `limit` entries of the universe file.
    pub fn resolve_tickers(
        &self,
        explicit: &[String],
        limit: usize,
    ) -> Result<Vec<String>, UniverseError> {
        if !explicit.is_empty() {
            return Ok(explicit.iter().map(|t| t.to_uppercase()).collect());
        }
        if self.tickers.is_empty() {
            return Err(UniverseError::NoTickers);
        }
        Ok(self.tickers.iter().take(limit).cloned().collect())
    }

    /// Exchange for a ticker, falling back to the run default.
    pub fn exchange_for(&self, ticker: &str, default: &str) -> String {
        self.exchanges
            .get(&ticker.to_uppercase())
            .cloned()
            .unwrap_or_else(|| default.to_lowercase())
    }
}

fn read_ticker_array(path: &Path) -> Result<Vec<String>, UniverseError> {
    let raw = fs::read_to_string(path).map_err(|source| UniverseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let entries: Vec<String> = serde_json::from_str(&raw).map_err(|source| UniverseError::Json {
        path: path.display().to_string(),
        source,
    })?;
    Ok(entries
        .into_iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_explicit_tickers_win() {
        let snapshot = UniverseSnapshot::default();
        let tickers = snapshot
            .resolve_tickers(&["aapl".to_string(), "MSFT".to_string()], 5)
            .unwrap();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_fallback_requires_universe() {
        let snapshot = UniverseSnapshot::default();
        assert!(matches!(
            snapshot.resolve_tickers(&[], 5),
            Err(UniverseError::NoTickers)
        ));
    }

    #[test]
    fn test_load_and_classify() {
        let dir = tempfile::tempdir().unwrap();
        let tickers_path = write_json(&dir, "tickers.json", r#"["AAPL", "MSFT", "BTCUSD", "GCUSD"]"#);
        let crypto_path = write_json(&dir, "crypto.json", r#"["BTCUSD", "ETHUSD"]"#);

        let mut settings = UniverseSettings::default();
        settings.tickers_path = Some(tickers_path);
        settings
            .exchange_lists
            .insert("crypto".to_string(), crypto_path);

        let snapshot = UniverseSnapshot::load(&settings).unwrap();

        let tickers = snapshot.resolve_tickers(&[], 2).unwrap();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);

        assert_eq!(snapshot.exchange_for("BTCUSD", "nasdaq"), "crypto");
        assert_eq!(snapshot.exchange_for("AAPL", "NASDAQ"), "nasdaq");
    }

    #[test]
    fn test_missing_exchange_list_is_skipped() {
        let mut settings = UniverseSettings::default();
        settings
            .exchange_lists
            .insert("crypto".to_string(), "/nonexistent/crypto.json".to_string());

        let snapshot = UniverseSnapshot::load(&settings).unwrap();
        assert_eq!(snapshot.exchange_for("BTCUSD", "nasdaq"), "nasdaq");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, "tickers.json", "{not json");

        let mut settings = UniverseSettings::default();
        settings.tickers_path = Some(path);

        assert!(matches!(
            UniverseSnapshot::load(&settings),
            Err(UniverseError::Json { .. })
        ));
    }
}
