//! Price data loading and indicator series.
//!
//! Prices come from a [`PriceSource`]. The crate ships a CSV directory source
//! (one `<TICKER>.csv` per symbol) and an in-memory source; network download
//! is left to callers implementing the trait.

use crate::error::{BacktestError, Result};
use crate::types::Bar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATE_ALIASES: &[&str] = &["date", "timestamp", "time", "datetime"];
const OPEN_ALIASES: &[&str] = &["open", "o"];
const HIGH_ALIASES: &[&str] = &["high", "h"];
const LOW_ALIASES: &[&str] = &["low", "l"];
const ADJ_CLOSE_ALIASES: &[&str] = &["adj close", "adj_close", "adjclose", "adjusted close"];
const VOLUME_ALIASES: &[&str] = &["volume", "v", "vol"];

/// Raw CSV row with flexible header names.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(
        alias = "Date",
        alias = "DATE",
        alias = "Timestamp",
        alias = "timestamp",
        alias = "Time",
        alias = "time",
        alias = "datetime",
        alias = "Datetime"
    )]
    date: String,
    #[serde(alias = "Open", alias = "o", default)]
    open: Option<f64>,
    #[serde(alias = "High", alias = "h", default)]
    high: Option<f64>,
    #[serde(alias = "Low", alias = "l", default)]
    low: Option<f64>,
    #[serde(alias = "Close", alias = "c", default)]
    close: Option<f64>,
    #[serde(
        alias = "Adj Close",
        alias = "adj close",
        alias = "adjclose",
        alias = "Adjusted Close",
        alias = "adjusted close",
        default
    )]
    adj_close: Option<f64>,
    #[serde(alias = "Volume", alias = "v", alias = "vol", alias = "Vol", default)]
    volume: Option<f64>,
}

/// CSV parsing options.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Date format string (e.g. "%Y-%m-%d"). Common formats are tried when unset.
    pub date_format: Option<String>,
    /// CSV delimiter character.
    pub delimiter: u8,
    /// Skip malformed rows instead of failing.
    pub skip_invalid: bool,
    /// Also reject bars with inconsistent OHLC values. Off by default: only a
    /// non-finite or non-positive close disqualifies an otherwise complete row.
    pub validate_bars: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            delimiter: b',',
            skip_invalid: true,
            validate_bars: false,
        }
    }
}

/// Which optional columns the file actually carries.
#[derive(Debug, Default, Clone, Copy)]
struct AvailableColumns {
    open: bool,
    high: bool,
    low: bool,
    adj_close: bool,
    volume: bool,
}

impl AvailableColumns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let has = |aliases: &[&str]| {
            headers
                .iter()
                .any(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
        };
        Self {
            open: has(OPEN_ALIASES),
            high: has(HIGH_ALIASES),
            low: has(LOW_ALIASES),
            adj_close: has(ADJ_CLOSE_ALIASES),
            volume: has(VOLUME_ALIASES),
        }
    }

    /// A row is complete when every column present in the file has a value.
    fn row_complete(&self, row: &CsvRow) -> bool {
        row.close.is_some()
            && (!self.open || row.open.is_some())
            && (!self.high || row.high.is_some())
            && (!self.low || row.low.is_some())
            && (!self.adj_close || row.adj_close.is_some())
            && (!self.volume || row.volume.is_some())
    }
}

/// Parse a date string with multiple format attempts.
pub fn parse_datetime(s: &str, format: Option<&str>) -> Result<DateTime<Utc>> {
    let s = s.trim();
    let midnight = |d: NaiveDate| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN));

    if let Some(fmt) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(midnight(d));
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y/%m/%d %H:%M:%S",
    ];
    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    // yfinance writes "2024-01-02 00:00:00+00:00" style indexes
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y", "%d-%b-%Y"];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(midnight(d));
        }
    }

    Err(BacktestError::DataError(format!(
        "Could not parse date: '{}'",
        s
    )))
}

/// Parse a `YYYY-MM-DD` run date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?)
}

/// Load daily bars from a CSV file.
///
/// Rows missing the close, or missing a value for any other column the file
/// carries, are dropped. The result is sorted by date with duplicates removed.
pub fn load_csv(path: impl AsRef<Path>, config: &DataConfig) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    info!("Loading data from: {}", path.display());

    let reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(config.delimiter)
        .flexible(true)
        .from_path(path)?;
    read_bars(reader, config)
}

/// Load daily bars from CSV text.
pub fn load_csv_str(content: &str, config: &DataConfig) -> Result<Vec<Bar>> {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(config.delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());
    read_bars(reader, config)
}

fn read_bars<R: Read>(mut reader: csv::Reader<R>, config: &DataConfig) -> Result<Vec<Bar>> {
    let headers = reader.headers()?.clone();
    let has_date = headers
        .iter()
        .any(|h| DATE_ALIASES.contains(&h.trim().to_lowercase().as_str()));
    if !has_date {
        return Err(BacktestError::DataError(
            "CSV has no date column".to_string(),
        ));
    }
    let available = AvailableColumns::from_headers(&headers);

    let mut bars = Vec::new();
    let mut skipped = 0;
    let mut incomplete = 0;

    for (row_num, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) if config.skip_invalid => {
                debug!("Skipping row {}: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(BacktestError::CsvError(e)),
        };

        if !available.row_complete(&row) {
            incomplete += 1;
            continue;
        }

        let timestamp = match parse_datetime(&row.date, config.date_format.as_deref()) {
            Ok(ts) => ts,
            Err(e) if config.skip_invalid => {
                debug!("Skipping row {} due to date parse error: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let Some(close) = row.close else { continue };
        let bar = Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close,
            adj_close: row.adj_close,
            volume: row.volume,
        };

        let usable = if config.validate_bars {
            bar.validate()
        } else {
            bar.has_usable_close()
        };
        if !usable {
            if config.skip_invalid {
                debug!("Skipping row {} due to invalid bar data: {:?}", row_num + 1, bar);
                skipped += 1;
                continue;
            }
            return Err(BacktestError::DataError(format!(
                "Invalid bar data at row {}: {:?}",
                row_num + 1,
                bar
            )));
        }

        bars.push(bar);
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }
    if incomplete > 0 {
        debug!("Dropped {} rows with missing values", incomplete);
    }

    bars.sort_by_key(|b| b.timestamp);
    let original_len = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    if bars.len() < original_len {
        warn!("Removed {} duplicate timestamps", original_len - bars.len());
    }

    info!(
        "Loaded {} bars from {} to {}",
        bars.len(),
        bars.first().map(|b| b.date().to_string()).unwrap_or_default(),
        bars.last().map(|b| b.date().to_string()).unwrap_or_default()
    );

    Ok(bars)
}

/// Keep bars with `start <= date < end`.
pub fn filter_date_range(bars: &[Bar], start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    bars.iter()
        .filter(|b| {
            let d = b.date();
            d >= start && d < end
        })
        .cloned()
        .collect()
}

/// A source of historical daily bars.
pub trait PriceSource: Send + Sync {
    /// Fetch the bars of `ticker` dated in `[start, end)`, oldest first,
    /// with incomplete rows already removed.
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>>;
}

/// Reads `<dir>/<TICKER>.csv` for each requested ticker.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    dir: PathBuf,
    config: DataConfig,
}

impl CsvDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: DataConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DataConfig) -> Self {
        self.config = config;
        self
    }

    /// File backing `ticker`.
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }
}

impl PriceSource for CsvDirectorySource {
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        let path = self.path_for(ticker);
        if !path.is_file() {
            return Err(BacktestError::provider(
                ticker,
                format!("no data file at {}", path.display()),
            ));
        }

        let bars = load_csv(&path, &self.config)
            .map_err(|e| BacktestError::provider(ticker, e.to_string()))?;
        let bars = filter_date_range(&bars, start, end);
        if bars.is_empty() {
            return Err(BacktestError::provider(
                ticker,
                format!("no bars between {} and {}", start, end),
            ));
        }
        Ok(bars)
    }
}

/// Serves pre-loaded series; handy for tests and notebooks.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<String, Vec<Bar>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: impl Into<String>, bars: Vec<Bar>) {
        self.series.insert(ticker.into(), bars);
    }

    pub fn with_series(mut self, ticker: impl Into<String>, bars: Vec<Bar>) -> Self {
        self.insert(ticker, bars);
        self
    }
}

impl PriceSource for InMemorySource {
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        let bars = self
            .series
            .get(ticker)
            .ok_or_else(|| BacktestError::provider(ticker, "unknown symbol"))?;
        let bars: Vec<Bar> = filter_date_range(bars, start, end)
            .into_iter()
            .filter(Bar::has_usable_close)
            .collect();
        if bars.is_empty() {
            return Err(BacktestError::provider(
                ticker,
                format!("no bars between {} and {}", start, end),
            ));
        }
        Ok(bars)
    }
}

// ---------------------------------------------------------------------------
// Indicator series
//
// Every function returns one value per input row. `None` marks rows where the
// indicator is not yet defined (warm-up) or is undefined (0/0).
// ---------------------------------------------------------------------------

/// Simple percentage change: `x[t] / x[t-1] - 1`.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(values.windows(2).map(|w| Some(w[1] / w[0] - 1.0)));
    out
}

/// Rolling arithmetic mean over a full window.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for end in window..=values.len() {
        let sum: f64 = values[end - window..end].iter().sum();
        out[end - 1] = Some(sum / window as f64);
    }
    out
}

/// Rolling sample standard deviation (n - 1). Any undefined value inside the
/// window makes the result undefined.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window < 2 || values.len() < window {
        return out;
    }
    for end in window..=values.len() {
        let slice: Option<Vec<f64>> = values[end - window..end].iter().copied().collect();
        if let Some(slice) = slice {
            out[end - 1] = Some(sample_std(&slice));
        }
    }
    out
}

/// Exponentially weighted mean with the recursive (non-adjusted) form:
/// `y[0] = x[0]`, `y[t] = a x[t] + (1 - a) y[t-1]`, `a = 2 / (span + 1)`.
pub fn ewm(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &x in values {
        let y = match prev {
            Some(p) => alpha * x + (1.0 - alpha) * p,
            None => x,
        };
        out.push(y);
        prev = Some(y);
    }
    out
}

/// Relative Strength Index from rolling simple means of gains and losses.
///
/// The first price change is taken as zero, so the first value is defined
/// at index `period - 1`. Zero average gain and loss is undefined; zero loss
/// alone gives 100.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        let delta = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    rolling_mean(&gains, period)
        .into_iter()
        .zip(rolling_mean(&losses, period))
        .map(|(gain, loss)| match (gain, loss) {
            (Some(g), Some(l)) if l == 0.0 && g == 0.0 => None,
            (Some(_), Some(l)) if l == 0.0 => Some(100.0),
            (Some(g), Some(l)) => Some(100.0 - 100.0 / (1.0 + g / l)),
            _ => None,
        })
        .collect()
}

/// MACD line and its signal line.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>) {
    let fast_ema = ewm(closes, fast);
    let slow_ema = ewm(closes, slow);
    let macd_line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ewm(&macd_line, signal);
    (macd_line, signal_line)
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); NaN for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
