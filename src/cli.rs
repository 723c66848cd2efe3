//! Command-line interface for the backtester.

use quant_backtester::analytics::{ResultFormatter, TradeReport};
use quant_backtester::config::{generate_example_config, load_config};
use quant_backtester::data::{parse_date, CsvDirectorySource, PriceSource};
use quant_backtester::error::Result;
use quant_backtester::export::metrics_to_csv;
use quant_backtester::pipeline::{parse_tickers, run_batch, BatchReport, OutputOptions, RunRequest};
use quant_backtester::strategy::{StrategyKind, StrategyParams};
use quant_backtester::viz::equity_sparkline;
use quant_backtester::BacktestError;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// quant-backtester - single-asset signal backtests over daily prices.
#[derive(Parser)]
#[command(name = "quant-backtester")]
#[command(version)]
#[command(about = "Backtest SMA, RSI, MACD and random-forest signals over daily price files")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Backtest one strategy over a list of tickers
    Run {
        /// Comma-separated tickers, e.g. "AAPL,MSFT"
        #[arg(short, long)]
        tickers: String,

        /// Strategy: SMA, RSI, MACD or ML
        #[arg(short = 'S', long, default_value = "SMA")]
        strategy: String,

        /// Start date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End date, exclusive (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        #[command(flatten)]
        opts: IoArgs,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Run a backtest from a configuration file
    RunConfig {
        /// Path to TOML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Generate an example configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "backtest.toml")]
        output: PathBuf,
    },

    /// Show information about available strategies
    Strategies,

    /// Prompt for tickers, strategy and dates on stdin
    Interactive {
        #[command(flatten)]
        opts: IoArgs,
    },
}

/// Data and results locations shared by the run commands.
#[derive(clap::Args, Debug, Clone)]
pub struct IoArgs {
    /// Directory holding <TICKER>.csv price files
    #[arg(short, long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for charts, trade logs and metrics
    #[arg(short, long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Run tickers in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,

    /// Skip the per-ticker PNG charts
    #[arg(long)]
    pub no_charts: bool,

    /// Skip the per-ticker trade logs
    #[arg(long)]
    pub no_trade_logs: bool,

    /// Also write metrics.json
    #[arg(long)]
    pub metrics_json: bool,

    /// Print the trade log of every ticker (text output only)
    #[arg(long)]
    pub show_trades: bool,
}

impl IoArgs {
    fn output_options(&self) -> OutputOptions {
        OutputOptions {
            dir: self.results_dir.clone(),
            charts: !self.no_charts,
            trade_logs: !self.no_trade_logs,
            metrics_csv: true,
            metrics_json: self.metrics_json,
        }
    }
}

/// Strategy parameter overrides.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// Short SMA window
    #[arg(long)]
    pub sma_short: Option<usize>,
    /// Long SMA window
    #[arg(long)]
    pub sma_long: Option<usize>,
    /// RSI period
    #[arg(long)]
    pub rsi_period: Option<usize>,
    /// RSI buy threshold
    #[arg(long)]
    pub rsi_lower: Option<f64>,
    /// RSI sell threshold
    #[arg(long)]
    pub rsi_upper: Option<f64>,
    /// MACD fast EMA span
    #[arg(long)]
    pub macd_fast: Option<usize>,
    /// MACD slow EMA span
    #[arg(long)]
    pub macd_slow: Option<usize>,
    /// MACD signal EMA span
    #[arg(long)]
    pub macd_signal: Option<usize>,
    /// Random-forest size
    #[arg(long)]
    pub ml_trees: Option<usize>,
    /// Random-forest seed
    #[arg(long)]
    pub ml_seed: Option<u64>,
}

impl ParamArgs {
    fn apply(&self, mut p: StrategyParams) -> StrategyParams {
        p.sma_short = self.sma_short.unwrap_or(p.sma_short);
        p.sma_long = self.sma_long.unwrap_or(p.sma_long);
        p.rsi_period = self.rsi_period.unwrap_or(p.rsi_period);
        p.rsi_lower = self.rsi_lower.unwrap_or(p.rsi_lower);
        p.rsi_upper = self.rsi_upper.unwrap_or(p.rsi_upper);
        p.macd_fast = self.macd_fast.unwrap_or(p.macd_fast);
        p.macd_slow = self.macd_slow.unwrap_or(p.macd_slow);
        p.macd_signal = self.macd_signal.unwrap_or(p.macd_signal);
        p.ml_trees = self.ml_trees.unwrap_or(p.ml_trees);
        p.ml_seed = self.ml_seed.unwrap_or(p.ml_seed);
        p
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl Cli {
    /// Initialize logging based on verbosity level.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("warning: could not install log subscriber: {}", e);
        }
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Run {
            tickers,
            strategy,
            start,
            end,
            opts,
            params,
        } => {
            let strategy: StrategyKind = strategy.parse()?;
            let request = RunRequest::new(
                parse_tickers(tickers),
                strategy,
                parse_date(start)?,
                parse_date(end)?,
            )
            .with_params(params.apply(StrategyParams::default()))
            .with_output(opts.output_options())
            .with_parallel(opts.parallel)
            .with_progress(opts.progress);

            execute(&CsvDirectorySource::new(&opts.data_dir), &request, cli.output, opts.show_trades)
        }

        Commands::RunConfig { config, progress } => run_from_config(config, *progress, cli.output),

        Commands::Init { output } => init_config(output),

        Commands::Strategies => {
            print_strategies();
            Ok(())
        }

        Commands::Interactive { opts } => {
            let stdin = io::stdin();
            let request = prompt_request(stdin.lock(), io::stdout())?
                .with_output(opts.output_options())
                .with_parallel(opts.parallel)
                .with_progress(opts.progress);

            execute(&CsvDirectorySource::new(&opts.data_dir), &request, cli.output, opts.show_trades)
        }
    }
}

/// Ask for tickers, strategy and dates. An unknown strategy is an error.
pub fn prompt_request<R: BufRead, W: Write>(mut input: R, mut out: W) -> Result<RunRequest> {
    let mut ask = |question: &str| -> Result<String> {
        write!(out, "{}", question)?;
        out.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    };

    let tickers = parse_tickers(&ask("Enter tickers (comma-separated, e.g., AAPL,MSFT,GOOG): ")?);
    let strategy: StrategyKind = ask("Choose strategy (SMA, RSI, MACD, ML): ")?.parse()?;
    let start = parse_date(&ask("Enter start date (YYYY-MM-DD): ")?)?;
    let end = parse_date(&ask("Enter end date (YYYY-MM-DD): ")?)?;

    Ok(RunRequest::new(tickers, strategy, start, end))
}

fn execute(
    source: &dyn PriceSource,
    request: &RunRequest,
    output: OutputFormat,
    show_trades: bool,
) -> Result<()> {
    if output == OutputFormat::Text {
        println!(
            "\nProcessing {} ticker(s) with the {} strategy...",
            request.tickers.len(),
            request.strategy
        );
    }

    let report = run_batch(source, request)?;

    match output {
        OutputFormat::Text => print_text_report(&report, show_trades),
        OutputFormat::Json => println!("{}", ResultFormatter::to_json(&report.metrics())?),
        OutputFormat::Csv => print!("{}", metrics_to_csv(&report.metrics())?),
    }

    for failure in &report.failures {
        eprintln!(
            "{} {}: {} ({})",
            "failed".red().bold(),
            failure.ticker,
            failure.error,
            failure.error.kind()
        );
    }
    Ok(())
}

fn print_text_report(report: &BatchReport, show_trades: bool) {
    for result in &report.results {
        ResultFormatter::print_report(&result.metrics, &result.strategy, &result.series);
        println!("  Equity: {}", equity_sparkline(&result.curves, 50));
        if show_trades {
            TradeReport::print_trades(&result.series.trade_events(), 0);
        }
    }

    if !report.results.is_empty() {
        println!();
        ResultFormatter::print_table(&report.metrics());
    }
    for path in &report.files {
        println!("{} {}", "saved".green(), path.display());
    }
}

fn print_strategies() {
    println!("\nAvailable Strategies:\n");
    for kind in StrategyKind::all() {
        println!("  {:<6} {}", kind.as_str().bold(), kind.description());
    }
    println!();
    println!("Parameters can be overridden with --sma-short, --rsi-period, --macd-fast, ...");
    println!("or in the [strategy.params] section of a configuration file.");
    println!();
    println!(
        "{}",
        "Note: ML predicts the rows it was trained on; its results are in-sample.".yellow()
    );
}

fn init_config(output: &Path) -> Result<()> {
    fs::write(output, generate_example_config())?;
    println!("Created example configuration file: {}", output.display());
    println!("\nEdit this file to customize your backtest, then run:");
    println!("  quant-backtester run-config -c {}", output.display());
    Ok(())
}

fn run_from_config(config_path: &Path, progress: bool, output: OutputFormat) -> Result<()> {
    let file_config = load_config(config_path)?;
    let request = file_config.to_request()?.with_progress(progress);
    info!(
        tickers = request.tickers.len(),
        strategy = %request.strategy,
        "loaded run configuration"
    );
    execute(&file_config.source()?, &request, output, false)
}

/// Print a fatal error the way the rest of the CLI reports problems.
pub fn report_error(error: &BacktestError) {
    eprintln!("{} {} ({})", "error:".red().bold(), error, error.kind());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from([
            "quant-backtester",
            "run",
            "-t",
            "AAPL,MSFT",
            "-S",
            "rsi",
            "--start",
            "2020-01-01",
            "--end",
            "2021-01-01",
            "--parallel",
            "--rsi-period",
            "10",
        ]);
        assert!(cli.is_ok());
        if let Ok(Cli {
            command: Commands::Run { opts, params, .. },
            ..
        }) = cli
        {
            assert!(opts.parallel);
            assert_eq!(opts.data_dir, PathBuf::from("data"));
            let p = params.apply(StrategyParams::default());
            assert_eq!(p.rsi_period, 10);
            assert_eq!(p.rsi_upper, 70.0);
        }
    }

    #[test]
    fn test_strategies_command() {
        let cli = Cli::try_parse_from(["quant-backtester", "strategies"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_verbose_count() {
        let cli = Cli::try_parse_from(["quant-backtester", "-vv", "init"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_prompt_request() {
        let input = b"aapl, msft\nmacd\n2020-01-01\n2022-06-30\n";
        let mut out = Vec::new();
        let request = prompt_request(&input[..], &mut out).unwrap();

        assert_eq!(request.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(request.strategy, StrategyKind::Macd);
        assert_eq!(request.start, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(request.end, NaiveDate::from_ymd_opt(2022, 6, 30).unwrap());
        assert!(String::from_utf8(out).unwrap().contains("Choose strategy"));
    }

    #[test]
    fn test_prompt_rejects_unknown_strategy() {
        let input = b"AAPL\nLSTM\n2020-01-01\n2021-01-01\n";
        let err = prompt_request(&input[..], Vec::new()).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigError(_)));
    }
}
