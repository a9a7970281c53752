//! Validated inclusive date range
//!
//! Constructed once at engine entry from the CLI's compact `DDMMYY` strings;
//! every downstream component trusts the `start <= end` invariant and never
//! re-validates.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc, Weekday};
use thiserror::Error;

use super::Interval;

/// Compact date format accepted on the command line (e.g. 040325 = March 4, 2025)
const COMPACT_FMT: &str = "%d%m%y";

/// Default lookback when no start date is given
const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Date range validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid date '{0}': expected format DDMMYY (e.g. 040325 for March 4, 2025)")]
    InvalidDateFormat(String),

    #[error("start date {start} must not be after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Inclusive start/end date pair with a bar interval.
///
/// Immutable once constructed; shared read-only across all workers in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
}

impl DateRange {
    /// Build a range from already-parsed dates, enforcing `start <= end`.
    pub fn new(start: NaiveDate, end: NaiveDate, interval: Interval) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            interval,
        })
    }

    /// Build a range from the compact CLI strings.
    ///
    /// A missing end defaults to today (local time); a missing start defaults
    /// to thirty days before the end.
    pub fn from_compact(
        start: Option<&str>,
        end: Option<&str>,
        interval: Interval,
    ) -> Result<Self, RangeError> {
        let end = match end {
            Some(s) => parse_compact(s)?,
            None => Local::now().date_naive(),
        };
        let start = match start {
            Some(s) => parse_compact(s)?,
            None => end - Duration::days(DEFAULT_LOOKBACK_DAYS),
        };
        Self::new(start, end, interval)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Range start as a UTC instant (midnight).
    pub fn start_datetime(&self) -> DateTime<Utc> {
        // and_hms_opt with in-range components cannot fail
        self.start.and_hms_opt(0, 0, 0).unwrap().and_utc()
    }

    /// Range end as a UTC instant (last second of the end day, inclusive).
    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.end.and_hms_opt(23, 59, 59).unwrap().and_utc()
    }

    /// Whether a bar timestamp falls inside the range.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start_datetime() && ts <= self.end_datetime()
    }

    /// All weekdays in the range, oldest first.
    ///
    /// Upstream intraday endpoints only carry data for trading days, so
    /// provider requests are built over this list.
    pub fn business_days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut day = self.start;
        while day <= self.end {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(day);
            }
            day = day + Duration::days(1);
        }
        days
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {} @ {}", self.start, self.end, self.interval)
    }
}

fn parse_compact(s: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(s, COMPACT_FMT)
        .map_err(|_| RangeError::InvalidDateFormat(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_valid_range() {
        let range = DateRange::from_compact(Some("010125"), Some("050125"), Interval::Min1).unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(range.end(), NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
    }

    #[test]
    fn test_single_day_range() {
        assert!(DateRange::from_compact(Some("040325"), Some("040325"), Interval::Min5).is_ok());
    }

    #[test]
    fn test_start_after_end() {
        let err = DateRange::from_compact(Some("060125"), Some("050125"), Interval::Min1)
            .unwrap_err();
        assert!(matches!(err, RangeError::InvalidRange { .. }));
    }

    #[test]
    fn test_malformed_dates() {
        for bad in ["badvalue", "0403256", "04032", "320125", "041325", ""] {
            let err = DateRange::from_compact(Some(bad), Some("050125"), Interval::Min1)
                .unwrap_err();
            assert_eq!(err, RangeError::InvalidDateFormat(bad.to_string()), "{bad}");
        }
    }

    #[test]
    fn test_default_start_is_thirty_days_back() {
        let range = DateRange::from_compact(None, Some("310125"), Interval::Min1).unwrap();
        assert_eq!(range.end(), NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn test_default_end_is_today() {
        let range = DateRange::from_compact(None, None, Interval::Min1).unwrap();
        assert_eq!(range.end(), Local::now().date_naive());
        assert_eq!(range.end() - range.start(), Duration::days(30));
    }

    #[test]
    fn test_utc_bounds_and_contains() {
        let range = DateRange::from_compact(Some("010125"), Some("020125"), Interval::Min1).unwrap();
        assert_eq!(
            range.start_datetime(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            range.end_datetime(),
            Utc.with_ymd_and_hms(2025, 1, 2, 23, 59, 59).unwrap()
        );
        assert!(range.contains(Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_business_days_skip_weekends() {
        // 2025-01-01 is a Wednesday; the 4th/5th are a weekend.
        let range = DateRange::from_compact(Some("010125"), Some("070125"), Interval::Min1).unwrap();
        let days = range.business_days();
        assert_eq!(days.len(), 5);
        assert!(days
            .iter()
            .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
    }
}
