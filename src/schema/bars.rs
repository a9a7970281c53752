//! Normalized bar record and interval types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV price observation for a ticker at a fixed interval.
///
/// This is the canonical representation shared by the network and CSV
/// ingestion paths. `(ticker, timestamp)` is the uniqueness key in the
/// persisted store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRecord {
    /// Ticker symbol (uppercase)
    pub ticker: String,
    /// Bar timestamp (start of the interval)
    pub timestamp: DateTime<Utc>,
    /// Exchange identifier (lowercase, e.g. "nasdaq")
    pub exchange: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

impl BarRecord {
    /// The uniqueness key for conflict handling.
    pub fn key(&self) -> (String, DateTime<Utc>) {
        (self.ticker.clone(), self.timestamp)
    }

    /// Calendar date of the bar (UTC).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Bar interval in minutes, restricted to the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Min1,
    Min5,
    Min15,
    Min30,
    Min60,
}

/// Error for interval values outside the allowed set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("interval {0} not in allowed set {{1, 5, 15, 30, 60}}")]
pub struct IntervalParseError(pub u32);

impl Interval {
    /// Interval length in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Interval::Min1 => 1,
            Interval::Min5 => 5,
            Interval::Min15 => 15,
            Interval::Min30 => 30,
            Interval::Min60 => 60,
        }
    }

    /// Path segment used by the FMP historical-chart endpoint.
    pub fn as_endpoint_segment(&self) -> &'static str {
        match self {
            Interval::Min1 => "1min",
            Interval::Min5 => "5min",
            Interval::Min15 => "15min",
            Interval::Min30 => "30min",
            Interval::Min60 => "1hour",
        }
    }
}

impl TryFrom<u32> for Interval {
    type Error = IntervalParseError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            1 => Ok(Interval::Min1),
            5 => Ok(Interval::Min5),
            15 => Ok(Interval::Min15),
            30 => Ok(Interval::Min30),
            60 => Ok(Interval::Min60),
            other => Err(IntervalParseError(other)),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}min", self.minutes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_interval_allowed_set() {
        assert_eq!(Interval::try_from(5), Ok(Interval::Min5));
        assert_eq!(Interval::try_from(60).map(|i| i.minutes()), Ok(60));
        assert!(Interval::try_from(7).is_err());
        assert!(Interval::try_from(0).is_err());
    }

    #[test]
    fn test_interval_endpoint_segment() {
        assert_eq!(Interval::Min1.as_endpoint_segment(), "1min");
        assert_eq!(Interval::Min60.as_endpoint_segment(), "1hour");
    }

    #[test]
    fn test_bar_key_and_date() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 3, 15, 30, 0).unwrap();
        let bar = BarRecord {
            ticker: "AAPL".to_string(),
            timestamp: ts,
            exchange: "nasdaq".to_string(),
            open: dec!(185.2),
            high: dec!(185.9),
            low: dec!(185.1),
            close: dec!(185.5),
            volume: 120_400,
        };

        assert_eq!(bar.key(), ("AAPL".to_string(), ts));
        assert_eq!(bar.date(), NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
    }
}
