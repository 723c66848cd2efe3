//! Configuration file support for backtest runs.
//!
//! A TOML file with `[run]`, `[data]` and `[strategy]` sections describes a
//! complete batch so it can be repeated. Every field has a default.

use crate::data::{parse_date, CsvDirectorySource, DataConfig};
use crate::error::{BacktestError, Result};
use crate::pipeline::{parse_tickers, OutputOptions, RunRequest};
use crate::strategy::{StrategyKind, StrategyParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Complete run configuration loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFileConfig {
    /// Tickers, period and output settings.
    #[serde(default)]
    pub run: RunSettings,
    /// Where price files live.
    #[serde(default)]
    pub data: DataSettings,
    /// Strategy selection and parameters.
    #[serde(default)]
    pub strategy: StrategySettings,
}

/// Batch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Comma-separated ticker list, e.g. `"AAPL, MSFT"`.
    pub tickers: String,
    /// Start date, inclusive (YYYY-MM-DD).
    pub start_date: String,
    /// End date, exclusive (YYYY-MM-DD).
    pub end_date: String,
    pub output_dir: String,
    pub charts: bool,
    pub trade_logs: bool,
    pub metrics_json: bool,
    pub parallel: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tickers: "AAPL".to_string(),
            start_date: "2020-01-01".to_string(),
            end_date: "2024-01-01".to_string(),
            output_dir: "results".to_string(),
            charts: true,
            trade_logs: true,
            metrics_json: false,
            parallel: false,
        }
    }
}

/// Data settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory holding one `<TICKER>.csv` per symbol.
    pub dir: String,
    /// Date format in CSV.
    pub date_format: Option<String>,
    /// CSV delimiter.
    pub delimiter: char,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: "data".to_string(),
            date_format: None,
            delimiter: ',',
        }
    }
}

/// Strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// One of SMA, RSI, MACD, ML (case-insensitive).
    pub name: String,
    pub params: StrategyParams,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            name: "SMA".to_string(),
            params: StrategyParams::default(),
        }
    }
}

impl RunFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Price source described by the `[data]` section.
    pub fn source(&self) -> Result<CsvDirectorySource> {
        if !self.data.delimiter.is_ascii() {
            return Err(BacktestError::ConfigError(format!(
                "CSV delimiter must be ASCII, got '{}'",
                self.data.delimiter
            )));
        }
        let config = DataConfig {
            date_format: self.data.date_format.clone(),
            delimiter: self.data.delimiter as u8,
            ..Default::default()
        };
        Ok(CsvDirectorySource::new(&self.data.dir).with_config(config))
    }

    /// Validate and turn the file into a batch request.
    pub fn to_request(&self) -> Result<RunRequest> {
        let tickers = parse_tickers(&self.run.tickers);
        if tickers.is_empty() {
            return Err(BacktestError::ConfigError(
                "[run] tickers is empty".to_string(),
            ));
        }
        let strategy: StrategyKind = self.strategy.name.parse()?;
        let start = parse_date(&self.run.start_date)?;
        let end = parse_date(&self.run.end_date)?;

        let output = OutputOptions {
            dir: PathBuf::from(&self.run.output_dir),
            charts: self.run.charts,
            trade_logs: self.run.trade_logs,
            metrics_csv: true,
            metrics_json: self.run.metrics_json,
        };

        Ok(RunRequest::new(tickers, strategy, start, end)
            .with_params(self.strategy.params.clone())
            .with_output(output)
            .with_parallel(self.run.parallel))
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<RunFileConfig> {
    RunFileConfig::load(path)
}

/// Example configuration file content.
pub fn generate_example_config() -> String {
    r#"# quant-backtester run configuration

[run]
tickers = "AAPL, MSFT, SPY"
start_date = "2020-01-01"   # inclusive
end_date = "2024-01-01"     # exclusive
output_dir = "results"
charts = true
trade_logs = true
metrics_json = false
parallel = false

[data]
dir = "data"                # expects data/<TICKER>.csv
# date_format = "%Y-%m-%d"
delimiter = ","

[strategy]
name = "SMA"                # SMA, RSI, MACD or ML

[strategy.params]
sma_short = 50
sma_long = 200
rsi_period = 14
rsi_lower = 30.0
rsi_upper = 70.0
macd_fast = 12
macd_slow = 26
macd_signal = 9
ml_trees = 100
ml_seed = 42
ml_test_size = 0.2
"#
    .to_string()
}
