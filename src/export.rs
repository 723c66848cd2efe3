//! Export utilities for backtest results.
//!
//! | File                        | Content                                   |
//! |-----------------------------|-------------------------------------------|
//! | `<TICKER>_pnl_signals.png`  | strategy/market curves with signal marks  |
//! | `<TICKER>_trade_log.csv`    | `Date,Close,Trade Type,Return`            |
//! | `metrics.csv`               | one row per ticker, NaN as empty field    |
//! | `metrics.json`              | same records, NaN as `null`               |
//!
//! # Example
//!
//! ```ignore
//! use quant_backtester::export::ResultsWriter;
//!
//! let writer = ResultsWriter::new("results")?;
//! writer.write_trade_log("AAPL", &series.trade_events())?;
//! writer.write_metrics_csv(&records)?;
//! ```

use crate::analytics::{format_float, MetricsRecord};
use crate::engine::{AugmentedSeries, CumulativeCurves};
use crate::error::Result;
use crate::types::TradeEvent;
use crate::viz::SignalChart;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Header of the per-ticker trade log.
pub const TRADE_LOG_HEADER: [&str; 4] = ["Date", "Close", "Trade Type", "Return"];

/// Writes result artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ResultsWriter {
    dir: PathBuf,
}

impl ResultsWriter {
    /// Use `dir` as the results directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn chart_path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}_pnl_signals.png", ticker))
    }

    pub fn trade_log_path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}_trade_log.csv", ticker))
    }

    pub fn metrics_csv_path(&self) -> PathBuf {
        self.dir.join("metrics.csv")
    }

    pub fn metrics_json_path(&self) -> PathBuf {
        self.dir.join("metrics.json")
    }

    /// Write `<TICKER>_pnl_signals.png`.
    pub fn write_chart(
        &self,
        ticker: &str,
        series: &AugmentedSeries,
        curves: &CumulativeCurves,
    ) -> Result<PathBuf> {
        let path = self.chart_path(ticker);
        SignalChart::new(ticker, series, curves).render_png(&path)?;
        debug!(path = %path.display(), "wrote chart");
        Ok(path)
    }

    /// Write `<TICKER>_trade_log.csv`.
    pub fn write_trade_log(&self, ticker: &str, events: &[TradeEvent]) -> Result<PathBuf> {
        let path = self.trade_log_path(ticker);
        let mut file = BufWriter::new(File::create(&path)?);
        write_trade_log(&mut file, events)?;
        file.flush()?;
        debug!(path = %path.display(), trades = events.len(), "wrote trade log");
        Ok(path)
    }

    /// Write `metrics.csv`.
    pub fn write_metrics_csv(&self, records: &[MetricsRecord]) -> Result<PathBuf> {
        let path = self.metrics_csv_path();
        let mut file = BufWriter::new(File::create(&path)?);
        write_metrics_csv(&mut file, records)?;
        file.flush()?;
        Ok(path)
    }

    /// Write `metrics.json`.
    pub fn write_metrics_json(&self, records: &[MetricsRecord]) -> Result<PathBuf> {
        let path = self.metrics_json_path();
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, records)?;
        Ok(path)
    }
}

/// Trade events as CSV.
pub fn write_trade_log<W: Write>(writer: W, events: &[TradeEvent]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(TRADE_LOG_HEADER)?;
    for event in events {
        csv.write_record([
            event.timestamp.format("%Y-%m-%d").to_string(),
            format_float(event.close),
            event.trade_type.to_string(),
            format_float(event.strategy_return),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Metrics records as CSV, metric columns first and `Ticker` last.
pub fn write_metrics_csv<W: Write>(writer: W, records: &[MetricsRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(MetricsRecord::COLUMNS)?;
    for record in records {
        csv.write_record(record.values(""))?;
    }
    csv.flush()?;
    Ok(())
}

/// Metrics records as a CSV string.
pub fn metrics_to_csv(records: &[MetricsRecord]) -> Result<String> {
    let mut buf = Vec::new();
    write_metrics_csv(&mut buf, records)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeType;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn record(ticker: &str, sharpe: f64) -> MetricsRecord {
        MetricsRecord {
            total_return_pct: 12.5,
            cagr_pct: 6.1,
            sharpe_ratio: sharpe,
            calmar_ratio: f64::NAN,
            volatility_pct: 18.25,
            max_drawdown_pct: 0.0,
            trade_count: 4,
            win_rate_pct: 50.0,
            max_consecutive_losses: 1,
            ticker: ticker.to_string(),
        }
    }

    #[test]
    fn test_trade_log_format() {
        let events = vec![
            TradeEvent {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                close: 102.5,
                trade_type: TradeType::Buy,
                strategy_return: 0.0,
            },
            TradeEvent {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
                close: 99.0,
                trade_type: TradeType::Sell,
                strategy_return: -0.0125,
            },
        ];
        let mut buf = Vec::new();
        write_trade_log(&mut buf, &events).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Date,Close,Trade Type,Return");
        assert_eq!(lines[1], "2024-01-02,102.5,Buy,0.0");
        assert_eq!(lines[2], "2024-01-05,99.0,Sell,-0.0125");
    }

    #[test]
    fn test_metrics_csv_nan_is_empty() {
        let csv = metrics_to_csv(&[record("AAA", 1.23), record("BBB", f64::NAN)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert!(lines[0].starts_with("Total Return (%),CAGR (%),Sharpe Ratio"));
        assert!(lines[0].ends_with(",Ticker"));
        assert_eq!(lines[1], "12.5,6.1,1.23,,18.25,0.0,4,50.0,1,AAA");
        assert_eq!(lines[2], "12.5,6.1,,,18.25,0.0,4,50.0,1,BBB");
    }

    #[test]
    fn test_results_writer_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("results");
        let writer = ResultsWriter::new(&out).unwrap();

        let csv_path = writer.write_metrics_csv(&[record("AAA", 1.0)]).unwrap();
        let json_path = writer.write_metrics_json(&[record("AAA", f64::NAN)]).unwrap();
        let log_path = writer.write_trade_log("AAA", &[]).unwrap();

        assert!(csv_path.ends_with("metrics.csv"));
        assert!(log_path.ends_with("AAA_trade_log.csv"));
        let json = fs::read_to_string(json_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed[0]["Sharpe Ratio"].is_null());
        assert_eq!(parsed[0]["Ticker"], "AAA");
        assert_eq!(
            fs::read_to_string(log_path).unwrap().trim(),
            "Date,Close,Trade Type,Return"
        );
    }
}
