//! Per-ticker pipeline and batch runner.
//!
//! provider → signal generator → engine → metrics → result files. Each
//! ticker owns its frame; nothing is shared between tickers except the
//! read-only provider and generator. A failing ticker is logged and reported
//! while the rest of the batch carries on.

use crate::analytics::{compute, MetricsRecord};
use crate::data::PriceSource;
use crate::engine::{run, AugmentedSeries, CumulativeCurves};
use crate::error::{BacktestError, Result};
use crate::export::ResultsWriter;
use crate::frame::SignalFrame;
use crate::strategy::{SignalGenerator, StrategyKind, StrategyParams};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Split a comma-separated ticker list: trimmed, upper-cased, empties dropped.
pub fn parse_tickers(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Which artifacts to write, and where.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub dir: PathBuf,
    pub charts: bool,
    pub trade_logs: bool,
    pub metrics_csv: bool,
    pub metrics_json: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            charts: true,
            trade_logs: true,
            metrics_csv: true,
            metrics_json: false,
        }
    }
}

impl OutputOptions {
    /// Write nothing to disk.
    pub fn none() -> Self {
        Self {
            charts: false,
            trade_logs: false,
            metrics_csv: false,
            metrics_json: false,
            ..Default::default()
        }
    }

    fn writes_anything(&self) -> bool {
        self.charts || self.trade_logs || self.metrics_csv || self.metrics_json
    }
}

/// Everything needed for one batch.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub tickers: Vec<String>,
    pub strategy: StrategyKind,
    pub params: StrategyParams,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub output: OutputOptions,
    /// Run tickers on the rayon pool instead of one after another.
    pub parallel: bool,
    pub show_progress: bool,
}

impl RunRequest {
    pub fn new(tickers: Vec<String>, strategy: StrategyKind, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            tickers,
            strategy,
            params: StrategyParams::default(),
            start,
            end,
            output: OutputOptions::default(),
            parallel: false,
            show_progress: false,
        }
    }

    pub fn with_params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_output(mut self, output: OutputOptions) -> Self {
        self.output = output;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// Successful run for one ticker.
#[derive(Debug, Clone)]
pub struct TickerResult {
    pub ticker: String,
    pub strategy: String,
    pub metrics: MetricsRecord,
    pub series: AugmentedSeries,
    pub curves: CumulativeCurves,
    /// Chart and trade log written for this ticker.
    pub files: Vec<PathBuf>,
}

/// A ticker that could not be processed.
#[derive(Debug)]
pub struct TickerFailure {
    pub ticker: String,
    pub error: BacktestError,
}

/// Outcome of a batch, in input ticker order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<TickerResult>,
    pub failures: Vec<TickerFailure>,
    /// Aggregate files (`metrics.csv`, `metrics.json`).
    pub files: Vec<PathBuf>,
}

impl BatchReport {
    /// Metrics records of the successful tickers.
    pub fn metrics(&self) -> Vec<MetricsRecord> {
        self.results.iter().map(|r| r.metrics.clone()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch, generate signals, backtest and score one ticker. Writes nothing.
pub fn run_ticker(
    source: &dyn PriceSource,
    generator: &dyn SignalGenerator,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<TickerResult> {
    let bars = source.fetch(ticker, start, end)?;
    debug!(ticker, bars = bars.len(), "fetched price series");

    let frame = generator.generate(&SignalFrame::new(bars))?;
    let (series, curves) = run(&frame)?;
    let metrics = compute(&series, &curves, start, end)?.with_ticker(ticker);

    info!(
        ticker,
        strategy = generator.name(),
        total_return = metrics.total_return_pct,
        trades = metrics.trade_count,
        "backtest complete"
    );

    Ok(TickerResult {
        ticker: ticker.to_string(),
        strategy: generator.name().to_string(),
        metrics,
        series,
        curves,
        files: Vec::new(),
    })
}

fn process(
    source: &dyn PriceSource,
    generator: &dyn SignalGenerator,
    writer: Option<&ResultsWriter>,
    request: &RunRequest,
    ticker: &str,
) -> Result<TickerResult> {
    let mut result = run_ticker(source, generator, ticker, request.start, request.end)?;
    if let Some(writer) = writer {
        if request.output.charts {
            result
                .files
                .push(writer.write_chart(ticker, &result.series, &result.curves)?);
        }
        if request.output.trade_logs {
            result
                .files
                .push(writer.write_trade_log(ticker, &result.series.trade_events())?);
        }
    }
    Ok(result)
}

/// Run every ticker of `request` against `source`.
///
/// An empty ticker list or an invalid strategy configuration fails the whole
/// run; errors for individual tickers are collected in the report.
pub fn run_batch(source: &dyn PriceSource, request: &RunRequest) -> Result<BatchReport> {
    if request.tickers.is_empty() {
        return Err(BacktestError::ConfigError(
            "no tickers given".to_string(),
        ));
    }

    let generator = request.strategy.build(&request.params)?;
    let writer = if request.output.writes_anything() {
        Some(ResultsWriter::new(&request.output.dir)?)
    } else {
        None
    };

    info!(
        tickers = request.tickers.len(),
        strategy = %request.strategy,
        start = %request.start,
        end = %request.end,
        parallel = request.parallel,
        "starting batch"
    );

    let progress = if request.show_progress {
        let pb = ProgressBar::new(request.tickers.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let step = |ticker: &String| {
        let outcome = process(source, generator.as_ref(), writer.as_ref(), request, ticker);
        if let Some(pb) = &progress {
            pb.set_message(ticker.clone());
            pb.inc(1);
        }
        (ticker.clone(), outcome)
    };

    let outcomes: Vec<(String, Result<TickerResult>)> = if request.parallel {
        request.tickers.par_iter().map(step).collect()
    } else {
        request.tickers.iter().map(step).collect()
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let mut report = BatchReport::default();
    for (ticker, outcome) in outcomes {
        match outcome {
            Ok(result) => report.results.push(result),
            Err(error) => {
                warn!(ticker = %ticker, kind = error.kind(), "{}", error);
                report.failures.push(TickerFailure { ticker, error });
            }
        }
    }

    if let Some(writer) = &writer {
        let records = report.metrics();
        if request.output.metrics_csv {
            report.files.push(writer.write_metrics_csv(&records)?);
        }
        if request.output.metrics_json {
            report.files.push(writer.write_metrics_json(&records)?);
        }
    }

    info!(
        succeeded = report.results.len(),
        failed = report.failures.len(),
        "batch finished"
    );
    Ok(report)
}
