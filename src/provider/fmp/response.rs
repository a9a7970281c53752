//! FMP historical-chart response mapping

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::provider::ProviderError;
use crate::schema::BarRecord;

/// Timestamp format used by the historical-chart endpoint
const FMP_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// One bar as returned by `historical-chart/{interval}/{ticker}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FmpBar {
    /// Bar timestamp, e.g. "2025-01-03 15:30:00"
    pub date: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Volume arrives as a JSON number that may carry a fractional part
    pub volume: f64,
}

impl FmpBar {
    /// Normalize into the canonical record, stamping ticker and exchange.
    pub fn into_record(self, ticker: &str, exchange: &str) -> Result<BarRecord, ProviderError> {
        let naive = NaiveDateTime::parse_from_str(&self.date, FMP_DATETIME_FMT)
            .map_err(|e| ProviderError::Parse(format!("bad timestamp '{}': {}", self.date, e)))?;

        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(ProviderError::Parse(format!(
                "bad volume {} for {} at {}",
                self.volume, ticker, self.date
            )));
        }

        Ok(BarRecord {
            ticker: ticker.to_uppercase(),
            timestamp: naive.and_utc(),
            exchange: exchange.to_lowercase(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume as i64,
        })
    }
}

/// Decode a historical-chart payload.
///
/// FMP returns a JSON array of bars on success and `{}` or an error object
/// when there is no data; both of the latter decode to an empty batch.
pub fn decode_bars(
    body: &str,
    ticker: &str,
    exchange: &str,
) -> Result<Vec<BarRecord>, ProviderError> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("invalid JSON from provider: {}", e)))?;

    let rows = match parsed {
        serde_json::Value::Array(rows) => rows,
        _ => return Ok(Vec::new()),
    };

    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        let bar: FmpBar = serde_json::from_value(row)
            .map_err(|e| ProviderError::Parse(format!("bad bar object: {}", e)))?;
        bars.push(bar.into_record(ticker, exchange)?);
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"[
        {"date": "2025-01-03 15:30:00", "open": 243.36, "low": 243.01, "high": 243.71, "close": 243.58, "volume": 651443},
        {"date": "2025-01-03 15:29:00", "open": 243.25, "low": 243.12, "high": 243.40, "close": 243.36, "volume": 180201.0}
    ]"#;

    #[test]
    fn test_decode_bars() {
        let bars = decode_bars(SAMPLE, "aapl", "NASDAQ").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ticker, "AAPL");
        assert_eq!(bars[0].exchange, "nasdaq");
        assert_eq!(bars[0].open, dec!(243.36));
        assert_eq!(bars[0].volume, 651_443);
        assert_eq!(bars[1].volume, 180_201);
    }

    #[test]
    fn test_decode_empty_object_is_empty_batch() {
        assert!(decode_bars("{}", "AAPL", "nasdaq").unwrap().is_empty());
        assert!(decode_bars("[]", "AAPL", "nasdaq").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_timestamp() {
        let body = r#"[{"date": "03-01-2025", "open": 1, "low": 1, "high": 1, "close": 1, "volume": 10}]"#;
        assert!(matches!(
            decode_bars(body, "AAPL", "nasdaq"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_decode_rejects_negative_volume() {
        let body = r#"[{"date": "2025-01-03 15:30:00", "open": 1, "low": 1, "high": 1, "close": 1, "volume": -3}]"#;
        assert!(matches!(
            decode_bars(body, "AAPL", "nasdaq"),
            Err(ProviderError::Parse(_))
        ));
    }
}
