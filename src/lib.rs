//! # quant-backtester
//!
//! A single-asset signal backtester. Each strategy turns a daily close series
//! into a long/short/flat signal; the engine applies yesterday's signal to
//! today's market return and scores the result.
//!
//! ## Quick Start
//!
//! ```ignore
//! use quant_backtester::data::CsvDirectorySource;
//! use quant_backtester::pipeline::{run_batch, RunRequest};
//! use quant_backtester::strategy::StrategyKind;
//! use chrono::NaiveDate;
//!
//! let source = CsvDirectorySource::new("data");
//! let request = RunRequest::new(
//!     vec!["AAPL".to_string(), "MSFT".to_string()],
//!     StrategyKind::Sma,
//!     NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//! );
//!
//! let report = run_batch(&source, &request)?;
//! for result in &report.results {
//!     println!("{}: {:.2}%", result.ticker, result.metrics.total_return_pct);
//! }
//! ```
//!
//! ## Strategies
//!
//! - SMA crossover (short/long moving averages, default 50/200)
//! - RSI thresholds (period 14, bands 30/70)
//! - MACD line vs signal line (12/26/9)
//! - Random forest on five price features (in-sample, see [`strategies::RandomForestSignals`])
//!
//! ## Metrics
//!
//! Total return, CAGR, Sharpe, Calmar, volatility, max drawdown, trade count,
//! win rate and longest losing streak, all rounded to two decimals.
//!
//! # Modules
//!
//! - [`types`]: Bars, signals and trade events
//! - [`frame`]: Immutable per-ticker table handed between stages
//! - [`data`]: CSV loading, price providers and indicator series
//! - [`strategy`]: Signal generator trait and strategy registry
//! - [`strategies`]: Built-in signal generators
//! - [`ml`]: Standard scaler, decision tree and random forest
//! - [`engine`]: Lagged strategy returns and cumulative curves
//! - [`analytics`]: Performance metrics and terminal reporting
//! - [`viz`]: Sparklines and PNG signal charts
//! - [`export`]: Trade logs, metrics CSV/JSON and chart files
//! - [`pipeline`]: Per-ticker pipeline and batch runner
//! - [`config`]: TOML run configuration

pub mod analytics;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod export;
pub mod frame;
pub mod ml;
pub mod pipeline;
pub mod strategies;
pub mod strategy;
pub mod types;
pub mod viz;

// Re-exports for convenience
pub use analytics::{MetricsRecord, ResultFormatter, TradeReport};
pub use config::{load_config, RunFileConfig};
pub use data::{CsvDirectorySource, DataConfig, InMemorySource, PriceSource};
pub use engine::{AugmentedSeries, CumulativeCurves};
pub use error::{BacktestError, Result};
pub use frame::SignalFrame;
pub use pipeline::{run_batch, run_ticker, BatchReport, OutputOptions, RunRequest, TickerResult};
pub use strategy::{SignalGenerator, StrategyKind, StrategyParams};
pub use types::{Bar, Signal, TradeEvent, TradeType};
