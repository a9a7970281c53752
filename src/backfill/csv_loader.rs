//! CSV bar dump loader
//!
//! Parses previously downloaded bar dumps and feeds them through the same
//! insertion path as the network fetch. Expected header:
//! `ticker,timestamp,open,high,low,close,volume`; a `date` column and an
//! `exchange` column are tolerated since cached dumps carry them.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::schema::{BarRecord, DateRange};

use super::source::{BarSource, WorkItem};
use super::summary::TaskError;

/// Timestamp format used in bar dumps
const CSV_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Column aliases accepted for the bar timestamp
const TIMESTAMP_COLUMNS: [&str; 2] = ["timestamp", "datetime"];

/// Errors during CSV parsing
#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing header line")]
    MissingHeader,

    #[error("header is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("line {line}: expected {expected} fields, got {got}")]
    FieldCount {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: failed to parse {column} '{value}'")]
    Field {
        line: usize,
        column: &'static str,
        value: String,
    },
}

/// Resolved column positions for one file.
struct ColumnMap {
    width: usize,
    ticker: usize,
    timestamp: usize,
    exchange: Option<usize>,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl ColumnMap {
    fn from_header(header: &str) -> Result<Self, CsvError> {
        let names: Vec<String> = header
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .collect();
        let index: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let required = |column: &'static str| -> Result<usize, CsvError> {
            index
                .get(column)
                .copied()
                .ok_or(CsvError::MissingColumn(column))
        };

        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|c| index.get(*c).copied())
            .ok_or(CsvError::MissingColumn("timestamp"))?;

        Ok(Self {
            width: names.len(),
            ticker: required("ticker")?,
            timestamp,
            exchange: index.get("exchange").copied(),
            open: required("open")?,
            high: required("high")?,
            low: required("low")?,
            close: required("close")?,
            volume: required("volume")?,
        })
    }
}

/// Parse a decimal field that may use scientific notation (e.g. "7.3e-05").
fn parse_decimal(s: &str) -> Option<Decimal> {
    if let Ok(d) = Decimal::from_str(s) {
        return Some(d);
    }
    let f: f64 = s.parse().ok()?;
    Decimal::try_from(f).ok()
}

fn field_error(line: usize, column: &'static str, value: &str) -> CsvError {
    CsvError::Field {
        line,
        column,
        value: value.to_string(),
    }
}

/// Parse one data line against the resolved columns.
fn parse_line(
    fields: &[&str],
    columns: &ColumnMap,
    line: usize,
    default_exchange: &str,
) -> Result<BarRecord, CsvError> {
    let naive = NaiveDateTime::parse_from_str(fields[columns.timestamp], CSV_DATETIME_FMT)
        .map_err(|_| field_error(line, "timestamp", fields[columns.timestamp]))?;

    let decimal = |column: &'static str, idx: usize| -> Result<Decimal, CsvError> {
        parse_decimal(fields[idx]).ok_or_else(|| field_error(line, column, fields[idx]))
    };

    // Volume arrives as "123" or "123.0" in cached dumps
    let volume_raw = fields[columns.volume];
    let volume = volume_raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as i64)
        .ok_or_else(|| field_error(line, "volume", volume_raw))?;

    let exchange = columns
        .exchange
        .map(|idx| fields[idx].to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| default_exchange.to_string());

    Ok(BarRecord {
        ticker: fields[columns.ticker].to_uppercase(),
        timestamp: naive.and_utc(),
        exchange,
        open: decimal("open", columns.open)?,
        high: decimal("high", columns.high)?,
        low: decimal("low", columns.low)?,
        close: decimal("close", columns.close)?,
        volume,
    })
}

/// Parse a whole dump file into a bar batch.
pub fn parse_file(
    path: &Path,
    filter: Option<&DateRange>,
    default_exchange: &str,
) -> Result<Vec<BarRecord>, CsvError> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = lines.next().ok_or(CsvError::MissingHeader)??;
    let columns = ColumnMap::from_header(&header)?;

    let mut bars = Vec::new();
    let mut filtered = 0usize;

    for (i, line) in lines.enumerate() {
        let line_no = i + 2; // 1-based, after the header
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let fields: Vec<&str> = trimmed.split(',').map(|s| s.trim()).collect();
        if fields.len() != columns.width {
            return Err(CsvError::FieldCount {
                line: line_no,
                expected: columns.width,
                got: fields.len(),
            });
        }

        let bar = parse_line(&fields, &columns, line_no, default_exchange)?;
        if let Some(range) = filter {
            if !range.contains(bar.timestamp) {
                filtered += 1;
                continue;
            }
        }
        bars.push(bar);
    }

    if filtered > 0 {
        debug!(
            "{}: dropped {} out-of-range rows",
            path.display(),
            filtered
        );
    }

    Ok(bars)
}

/// List the CSV files in a directory, sorted by name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, CsvError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File-backed bar source feeding the common engine path.
pub struct CsvSource {
    filter: Option<DateRange>,
    default_exchange: String,
}

impl CsvSource {
    pub fn new(filter: Option<DateRange>, default_exchange: &str) -> Self {
        Self {
            filter,
            default_exchange: default_exchange.to_lowercase(),
        }
    }
}

#[async_trait]
impl BarSource for CsvSource {
    async fn load(&self, item: &WorkItem) -> Result<Vec<BarRecord>, TaskError> {
        let path = match item {
            WorkItem::File(path) => path.clone(),
            WorkItem::Ticker(ticker) => {
                return Err(TaskError::Parse(CsvError::Field {
                    line: 0,
                    column: "file",
                    value: format!("csv source cannot load ticker {}", ticker),
                }));
            }
        };

        let filter = self.filter;
        let exchange = self.default_exchange.clone();
        // File IO and parsing are synchronous; keep them off the async workers.
        let bars = tokio::task::spawn_blocking(move || {
            parse_file(&path, filter.as_ref(), &exchange)
        })
        .await
        .map_err(|e| {
            TaskError::Parse(CsvError::Io(std::io::Error::other(e.to_string())))
        })??;

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Interval;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const GOOD: &str = "\
ticker,date,timestamp,exchange,open,high,low,close,volume
AAPL,2025-01-02,2025-01-02 15:30:00,nasdaq,243.36,243.71,243.01,243.58,651443
AAPL,2025-01-02,2025-01-02 15:31:00,nasdaq,243.58,243.90,243.40,243.85,320100.0
";

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_good_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "aapl.csv", GOOD);

        let bars = parse_file(&path, None, "nasdaq").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ticker, "AAPL");
        assert_eq!(bars[0].open, dec!(243.36));
        assert_eq!(bars[1].volume, 320_100);
    }

    #[test]
    fn test_minimal_header_without_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
ticker,timestamp,open,high,low,close,volume
MSFT,2025-01-02 15:30:00,420.0,421.0,419.5,420.8,9000
";
        let path = write_file(&dir, "msft.csv", body);
        let bars = parse_file(&path, None, "NYSE").unwrap();
        assert_eq!(bars[0].exchange, "nyse");
    }

    #[test]
    fn test_datetime_header_alias() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
ticker,datetime,open,high,low,close,volume
MSFT,2025-01-02 15:30:00,420.0,421.0,419.5,420.8,9000
";
        let path = write_file(&dir, "msft.csv", body);
        assert_eq!(parse_file(&path, None, "nasdaq").unwrap().len(), 1);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.csv", "ticker,open,high,low,close,volume\n");
        assert!(matches!(
            parse_file(&path, None, "nasdaq"),
            Err(CsvError::MissingColumn("timestamp"))
        ));
    }

    #[test]
    fn test_malformed_row_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
ticker,timestamp,open,high,low,close,volume
AAPL,2025-01-02 15:30:00,not-a-price,243.71,243.01,243.58,651443
";
        let path = write_file(&dir, "bad.csv", body);
        assert!(matches!(
            parse_file(&path, None, "nasdaq"),
            Err(CsvError::Field { line: 2, column: "open", .. })
        ));
    }

    #[test]
    fn test_field_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
ticker,timestamp,open,high,low,close,volume
AAPL,2025-01-02 15:30:00,243.36,243.71
";
        let path = write_file(&dir, "bad.csv", body);
        assert!(matches!(
            parse_file(&path, None, "nasdaq"),
            Err(CsvError::FieldCount { line: 2, .. })
        ));
    }

    #[test]
    fn test_range_filter_drops_rows() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
ticker,timestamp,open,high,low,close,volume
AAPL,2025-01-02 15:30:00,243.36,243.71,243.01,243.58,100
AAPL,2025-02-02 15:30:00,250.00,251.00,249.00,250.50,100
";
        let path = write_file(&dir, "aapl.csv", body);
        let range =
            DateRange::from_compact(Some("010125"), Some("310125"), Interval::Min1).unwrap();
        let bars = parse_file(&path, Some(&range), "nasdaq").unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_scientific_notation_price() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
ticker,timestamp,open,high,low,close,volume
SHIBUSD,2025-01-02 15:30:00,7.3e-05,7.5e-05,7.1e-05,7.4e-05,1000000
";
        let path = write_file(&dir, "shib.csv", body);
        let bars = parse_file(&path, None, "crypto").unwrap();
        assert!(bars[0].open > Decimal::ZERO);
        assert!(bars[0].open < dec!(0.001));
    }

    #[test]
    fn test_list_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir, "b.csv", GOOD);
        write_file(&dir, "a.CSV", GOOD);
        write_file(&dir, "notes.txt", "ignored");

        let files = list_csv_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].file_name().unwrap().eq_ignore_ascii_case("a.csv"));
    }

    #[tokio::test]
    async fn test_source_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "aapl.csv", GOOD);

        let source = CsvSource::new(None, "nasdaq");
        let bars = source.load(&WorkItem::File(path)).await.unwrap();
        assert_eq!(bars.len(), 2);

        assert!(source
            .load(&WorkItem::Ticker("AAPL".into()))
            .await
            .is_err());
    }
}
