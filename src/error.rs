//! Error types for the backtester.

use thiserror::Error;

/// Main error type for the backtester.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// Invalid strategy selection or run configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Too few valid bars to compute returns or metrics.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A signal generator did not attach a required column.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Price retrieval failed for a ticker (unknown symbol, empty result, ...).
    #[error("Provider error for {ticker}: {message}")]
    ProviderError { ticker: String, message: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParseError(#[from] chrono::ParseError),

    #[error("Chart rendering error: {0}")]
    ChartError(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

impl BacktestError {
    /// Build a provider error for `ticker`.
    pub fn provider(ticker: impl Into<String>, message: impl Into<String>) -> Self {
        BacktestError::ProviderError {
            ticker: ticker.into(),
            message: message.into(),
        }
    }

    /// Short category label used when reporting per-ticker failures.
    pub fn kind(&self) -> &'static str {
        match self {
            BacktestError::ConfigError(_) => "ConfigurationError",
            BacktestError::InsufficientData(_) => "InsufficientData",
            BacktestError::MissingColumn(_) => "MissingColumn",
            BacktestError::ProviderError { .. } => "ProviderError",
            BacktestError::DataError(_)
            | BacktestError::CsvError(_)
            | BacktestError::DateParseError(_) => "DataError",
            BacktestError::IoError(_) => "IoError",
            BacktestError::ChartError(_) => "ChartError",
            BacktestError::JsonError(_)
            | BacktestError::TomlError(_)
            | BacktestError::TomlSerError(_) => "SerializationError",
        }
    }
}

/// Result type alias for backtester operations.
pub type Result<T> = std::result::Result<T, BacktestError>;
