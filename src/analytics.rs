//! Performance metrics and terminal reports.

use crate::data::{mean, sample_std};
use crate::engine::{AugmentedSeries, CumulativeCurves};
use crate::error::{BacktestError, Result};
use crate::types::{TradeEvent, TradeType};
use chrono::NaiveDate;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{builder::Builder, settings::Style};

/// Trading days per year used for annualisation.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Fixed-schema metrics for one ticker. Floats are rounded to two decimals;
/// NaN marks an undefined ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(rename = "Total Return (%)")]
    pub total_return_pct: f64,
    #[serde(rename = "CAGR (%)")]
    pub cagr_pct: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Calmar Ratio")]
    pub calmar_ratio: f64,
    #[serde(rename = "Volatility (%)")]
    pub volatility_pct: f64,
    #[serde(rename = "Max Drawdown (%)")]
    pub max_drawdown_pct: f64,
    #[serde(rename = "Trade Count")]
    pub trade_count: usize,
    #[serde(rename = "Win Rate (%)")]
    pub win_rate_pct: f64,
    #[serde(rename = "Max Consecutive Losses")]
    pub max_consecutive_losses: usize,
    #[serde(rename = "Ticker")]
    pub ticker: String,
}

impl MetricsRecord {
    /// Column headers in output order.
    pub const COLUMNS: [&'static str; 10] = [
        "Total Return (%)",
        "CAGR (%)",
        "Sharpe Ratio",
        "Calmar Ratio",
        "Volatility (%)",
        "Max Drawdown (%)",
        "Trade Count",
        "Win Rate (%)",
        "Max Consecutive Losses",
        "Ticker",
    ];

    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = ticker.into();
        self
    }

    /// Values in [`Self::COLUMNS`] order, with `nan` written via `fmt_nan`.
    pub fn values(&self, fmt_nan: &str) -> Vec<String> {
        let f = |v: f64| {
            if v.is_nan() {
                fmt_nan.to_string()
            } else {
                format_float(v)
            }
        };
        vec![
            f(self.total_return_pct),
            f(self.cagr_pct),
            f(self.sharpe_ratio),
            f(self.calmar_ratio),
            f(self.volatility_pct),
            f(self.max_drawdown_pct),
            self.trade_count.to_string(),
            f(self.win_rate_pct),
            self.max_consecutive_losses.to_string(),
            self.ticker.clone(),
        ]
    }
}

/// Decimal text for a float that keeps a fractional part on whole numbers
/// (`50.0`, not `50`).
pub fn format_float(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Round half-to-even at two decimals. NaN and infinities pass through.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    (value * 100.0).round_ties_even() / 100.0
}

/// Annualised Sharpe ratio (no risk-free rate); NaN when the sample stdev is
/// zero or undefined.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let std = sample_std(returns);
    if std == 0.0 || std.is_nan() {
        return f64::NAN;
    }
    TRADING_DAYS_PER_YEAR.sqrt() * mean(returns) / std
}

/// Annualised volatility as a fraction; NaN when the sample stdev is zero.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    let std = sample_std(returns);
    if std == 0.0 {
        return f64::NAN;
    }
    std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Largest drop of the running sum of returns below its running maximum.
///
/// This works on summed (not compounded) returns; the running maximum starts
/// at the first cumulative value, not at zero.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut cumsum = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for r in returns {
        cumsum += r;
        peak = peak.max(cumsum);
        worst = worst.max(peak - cumsum);
    }
    worst
}

/// Compound annual growth rate from a final growth factor over `days`
/// calendar days; NaN when `days` is zero.
pub fn cagr(final_value: f64, days: i64) -> f64 {
    if days == 0 {
        return f64::NAN;
    }
    final_value.powf(365.0 / days as f64) - 1.0
}

/// Longest run of strictly negative trade returns.
pub fn max_consecutive_losses(events: &[TradeEvent]) -> usize {
    let mut streak = 0;
    let mut longest = 0;
    for e in events {
        if e.strategy_return < 0.0 {
            streak += 1;
            longest = longest.max(streak);
        } else {
            streak = 0;
        }
    }
    longest
}

/// Compute the metrics record for one backtest. `start` and `end` are the
/// requested dates, which define the CAGR period.
pub fn compute(
    series: &AugmentedSeries,
    curves: &CumulativeCurves,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<MetricsRecord> {
    if series.is_empty() || curves.is_empty() {
        return Err(BacktestError::InsufficientData(
            "no returns to compute metrics from".to_string(),
        ));
    }

    let returns = series.strategy_returns();
    let final_value = curves.final_strategy();

    let drawdown = max_drawdown(&returns);
    let growth = cagr(final_value, (end - start).num_days());
    let calmar = if drawdown != 0.0 {
        growth / drawdown
    } else {
        f64::NAN
    };

    let events = series.trade_events();
    let trade_count = events.len();
    let wins = events.iter().filter(|e| e.strategy_return > 0.0).count();
    let win_rate = if trade_count > 0 {
        wins as f64 / trade_count as f64
    } else {
        0.0
    };

    Ok(MetricsRecord {
        total_return_pct: round2((final_value - 1.0) * 100.0),
        cagr_pct: round2(growth * 100.0),
        sharpe_ratio: round2(sharpe_ratio(&returns)),
        calmar_ratio: round2(calmar),
        volatility_pct: round2(annualized_volatility(&returns) * 100.0),
        max_drawdown_pct: round2(drawdown * 100.0),
        trade_count,
        win_rate_pct: round2(win_rate * 100.0),
        max_consecutive_losses: max_consecutive_losses(&events),
        ticker: String::new(),
    })
}

/// Terminal output of backtest results.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Print one ticker's metrics to stdout.
    pub fn print_report(record: &MetricsRecord, strategy: &str, series: &AugmentedSeries) {
        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", format!(" {} | {} ", record.ticker, strategy).bold().blue());
        println!("{}", "═".repeat(60).blue());
        println!();

        if let (Some(first), Some(last)) = (series.rows().first(), series.rows().last()) {
            println!("{}", "Overview".bold().underline());
            println!(
                "  Period:          {} to {}",
                first.timestamp.format("%Y-%m-%d"),
                last.timestamp.format("%Y-%m-%d")
            );
            println!("  Bars:            {}", series.len());
            println!();
        }

        println!("{}", "Performance".bold().underline());
        println!(
            "  Total Return:    {:>12}  {}",
            Self::fmt(record.total_return_pct),
            Self::format_pct_change(record.total_return_pct)
        );
        println!("  CAGR:            {:>12}%", Self::fmt(record.cagr_pct));
        println!();

        println!("{}", "Risk Metrics".bold().underline());
        println!("  Max Drawdown:    {:>12}%", Self::fmt(record.max_drawdown_pct));
        println!("  Volatility:      {:>12}%", Self::fmt(record.volatility_pct));
        println!("  Sharpe Ratio:    {:>12}", Self::fmt(record.sharpe_ratio));
        println!("  Calmar Ratio:    {:>12}", Self::fmt(record.calmar_ratio));
        println!();

        println!("{}", "Trade Statistics".bold().underline());
        println!("  Trades:          {:>12}", record.trade_count);
        println!("  Win Rate:        {:>12}%", Self::fmt(record.win_rate_pct));
        println!("  Max Loss Streak: {:>12}", record.max_consecutive_losses);
        println!();

        println!("{}", "═".repeat(60).blue());
    }

    fn fmt(value: f64) -> String {
        if value.is_nan() {
            "nan".to_string()
        } else {
            format!("{:.2}", value)
        }
    }

    /// Format percentage change with color.
    fn format_pct_change(pct: f64) -> String {
        if pct.is_nan() {
            String::new()
        } else if pct >= 0.0 {
            format!("(+{:.2}%)", pct).green().to_string()
        } else {
            format!("({:.2}%)", pct).red().to_string()
        }
    }

    /// Render the aggregate metrics table.
    pub fn table(records: &[MetricsRecord]) -> String {
        let mut builder = Builder::new();
        builder.push_record(MetricsRecord::COLUMNS);
        for record in records {
            builder.push_record(record.values("nan"));
        }
        builder.build().with(Style::rounded()).to_string()
    }

    /// Print the aggregate metrics table.
    pub fn print_table(records: &[MetricsRecord]) {
        println!("{}", Self::table(records));
    }

    /// Records as pretty JSON (NaN becomes `null`).
    pub fn to_json(records: &[MetricsRecord]) -> Result<String> {
        Ok(serde_json::to_string_pretty(records)?)
    }
}

/// Trade report generator.
pub struct TradeReport;

impl TradeReport {
    /// Print trade events; `limit == 0` prints all of them.
    pub fn print_trades(events: &[TradeEvent], limit: usize) {
        if events.is_empty() {
            println!("No trades.");
            return;
        }

        let shown = if limit > 0 && limit < events.len() {
            &events[..limit]
        } else {
            events
        };

        let mut builder = Builder::new();
        builder.push_record(["#", "Date", "Close", "Trade Type", "Return %"]);
        for (i, event) in shown.iter().enumerate() {
            let ret = event.strategy_return * 100.0;
            let ret_str = if ret >= 0.0 {
                format!("+{:.2}%", ret)
            } else {
                format!("{:.2}%", ret)
            };
            let kind = match event.trade_type {
                TradeType::Buy => "Buy".green().to_string(),
                TradeType::Sell => "Sell".red().to_string(),
            };
            builder.push_record([
                (i + 1).to_string(),
                event.timestamp.format("%Y-%m-%d").to_string(),
                format!("{:.2}", event.close),
                kind,
                ret_str,
            ]);
        }

        println!("{}", builder.build().with(Style::rounded()));

        if shown.len() < events.len() {
            println!("... and {} more trades", events.len() - shown.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run;
    use crate::frame::SignalFrame;
    use crate::types::{Bar, Signal};
    use chrono::{Duration, TimeZone, Utc};

    fn backtest(closes: &[f64], signals: &[i8]) -> (AugmentedSeries, CumulativeCurves) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::from_close(start + Duration::days(i as i64), c))
            .collect();
        let signals = signals
            .iter()
            .map(|&s| Signal::try_from(s).unwrap())
            .collect();
        run(&SignalFrame::new(bars).with_signals(signals).unwrap()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reference_scenario_metrics() {
        let (series, curves) = backtest(&[100.0, 102.0, 101.0, 105.0, 103.0], &[0, 1, 1, 1, -1]);
        let m = compute(&series, &curves, date(2024, 1, 1), date(2025, 1, 1)).unwrap();

        assert_eq!(m.total_return_pct, 0.98);
        assert_eq!(m.trade_count, 2);
        // Buy bar earned 0, sell bar lost.
        assert_eq!(m.win_rate_pct, 0.0);
        assert_eq!(m.max_consecutive_losses, 1);
        assert_eq!(m.sharpe_ratio, 1.65);
        assert_eq!(m.volatility_pct, 40.97);
        // 366 days in 2024, so CAGR sits just below the total return.
        assert_eq!(m.cagr_pct, 0.98);
        assert_eq!(m.max_drawdown_pct, 1.9);
        assert_eq!(m.calmar_ratio, 0.51);
    }

    #[test]
    fn test_flat_signals() {
        let (series, curves) = backtest(&[100.0, 101.0, 99.0, 103.0], &[0, 0, 0, 0]);
        let m = compute(&series, &curves, date(2024, 1, 1), date(2024, 12, 31)).unwrap();

        assert_eq!(m.total_return_pct, 0.0);
        assert_eq!(m.trade_count, 1);
        assert_eq!(m.win_rate_pct, 0.0);
        assert_eq!(m.max_consecutive_losses, 0);
        assert!(m.sharpe_ratio.is_nan());
        assert!(m.volatility_pct.is_nan());
        assert!(m.calmar_ratio.is_nan());
    }

    #[test]
    fn test_constant_prices() {
        let (series, curves) = backtest(&[50.0; 6], &[1, 1, -1, 1, 1, 1]);
        let m = compute(&series, &curves, date(2024, 1, 1), date(2024, 6, 1)).unwrap();
        assert!(series.market_returns().iter().all(|&r| r == 0.0));
        assert!(m.sharpe_ratio.is_nan());
        assert!(m.volatility_pct.is_nan());
    }

    #[test]
    fn test_zero_day_period_gives_nan_cagr() {
        let (series, curves) = backtest(&[100.0, 101.0, 102.0], &[1, 1, 1]);
        let d = date(2024, 1, 1);
        let m = compute(&series, &curves, d, d).unwrap();
        assert!(m.cagr_pct.is_nan());
        assert!(m.calmar_ratio.is_nan());
    }

    #[test]
    fn test_max_drawdown_uses_cumulative_sum() {
        // cumsum: 0.1, 0.05, 0.15, -0.05 -> peak 0.15, trough -0.05
        let dd = max_drawdown(&[0.1, -0.05, 0.1, -0.2]);
        assert!((dd - 0.2).abs() < 1e-12);
        // Running max starts at the first value, so an initial loss is not a drawdown.
        assert_eq!(max_drawdown(&[-0.1, 0.05]), 0.0);
    }

    #[test]
    fn test_summed_drawdown_differs_from_compounded() {
        let returns = [0.1, -0.1, -0.1];
        // Compounded equity 1.1 -> 0.891 is a 19% drop from the peak.
        let equity: Vec<f64> = returns
            .iter()
            .scan(1.0, |acc, r| {
                *acc *= 1.0 + r;
                Some(*acc)
            })
            .collect();
        let compounded = (equity[0] - equity[2]) / equity[0];
        assert!((compounded - 0.19).abs() < 1e-12);

        // Summed returns 0.1 -> -0.1 give 0.2.
        assert!((max_drawdown(&returns) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_consecutive_losses_reset_on_zero() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ev = |r: f64| TradeEvent {
            timestamp: ts,
            close: 1.0,
            trade_type: TradeType::Buy,
            strategy_return: r,
        };
        let events = [ev(-0.1), ev(-0.2), ev(0.0), ev(-0.1), ev(0.3)];
        assert_eq!(max_consecutive_losses(&events), 2);
        assert_eq!(max_consecutive_losses(&[]), 0);
    }

    #[test]
    fn test_format_float_keeps_decimal_point() {
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(50.0), "50.0");
        assert_eq!(format_float(0.98), "0.98");
        assert_eq!(format_float(-0.0125), "-0.0125");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_round2_is_half_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-1.0049), -1.0);
        assert!(round2(f64::NAN).is_nan());
    }

    #[test]
    fn test_json_nan_is_null() {
        let (series, curves) = backtest(&[100.0, 101.0, 99.0], &[0, 0, 0]);
        let m = compute(&series, &curves, date(2024, 1, 1), date(2024, 2, 1))
            .unwrap()
            .with_ticker("AAA");
        let json = ResultFormatter::to_json(&[m]).unwrap();
        assert!(json.contains("\"Sharpe Ratio\": null"));
        assert!(json.contains("\"Ticker\": \"AAA\""));
    }

    #[test]
    fn test_table_lists_every_ticker() {
        let (series, curves) = backtest(&[100.0, 101.0, 102.0], &[1, 1, 1]);
        let base = compute(&series, &curves, date(2024, 1, 1), date(2025, 1, 1)).unwrap();
        let table = ResultFormatter::table(&[
            base.clone().with_ticker("AAA"),
            base.with_ticker("BBB"),
        ]);
        assert!(table.contains("AAA"));
        assert!(table.contains("BBB"));
        assert!(table.contains("Sharpe Ratio"));
    }
}
