//! Backtest execution engine.
//!
//! Turns a frame carrying a signal column into per-bar market and strategy
//! returns plus the two cumulative equity curves. The position held over bar
//! `t` is the signal of bar `t - 1`; a signal never earns the return of the
//! bar it was computed on.

use crate::error::{BacktestError, Result};
use crate::frame::SignalFrame;
use crate::types::{Signal, TradeEvent, TradeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One retained bar of the backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub signal: Signal,
    /// `close[t] / close[t-1] - 1`
    pub market_return: f64,
    /// `signal[t-1] * market_return[t]`
    pub strategy_return: f64,
}

/// The trimmed series produced by [`run`].
#[derive(Debug, Clone)]
pub struct AugmentedSeries {
    rows: Vec<BacktestRow>,
    frame: SignalFrame,
}

impl AugmentedSeries {
    pub fn rows(&self) -> &[BacktestRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The input frame restricted to the retained rows (indicators included).
    pub fn frame(&self) -> &SignalFrame {
        &self.frame
    }

    pub fn strategy_returns(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.strategy_return).collect()
    }

    pub fn market_returns(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.market_return).collect()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.rows.iter().map(|r| r.signal).collect()
    }

    /// Bars whose signal differs from the previous retained bar. The first
    /// retained bar always counts.
    pub fn trade_events(&self) -> Vec<TradeEvent> {
        let mut events = Vec::new();
        let mut previous: Option<Signal> = None;
        for row in &self.rows {
            if previous != Some(row.signal) {
                events.push(TradeEvent {
                    timestamp: row.timestamp,
                    close: row.close,
                    trade_type: TradeType::from_signal(row.signal),
                    strategy_return: row.strategy_return,
                });
            }
            previous = Some(row.signal);
        }
        events
    }
}

/// Point on the cumulative equity curves (both start from 1.0 before the
/// first retained bar).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub timestamp: DateTime<Utc>,
    pub market: f64,
    pub strategy: f64,
}

/// Market and strategy growth of one unit, aligned with the augmented series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CumulativeCurves {
    points: Vec<CurvePoint>,
}

impl CumulativeCurves {
    fn from_rows(rows: &[BacktestRow]) -> Self {
        let mut market = 1.0;
        let mut strategy = 1.0;
        let points = rows
            .iter()
            .map(|r| {
                market *= 1.0 + r.market_return;
                strategy *= 1.0 + r.strategy_return;
                CurvePoint {
                    timestamp: r.timestamp,
                    market,
                    strategy,
                }
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn strategy(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.strategy).collect()
    }

    pub fn market(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.market).collect()
    }

    /// Last strategy value, NaN when empty.
    pub fn final_strategy(&self) -> f64 {
        self.points.last().map_or(f64::NAN, |p| p.strategy)
    }

    /// Last market value, NaN when empty.
    pub fn final_market(&self) -> f64 {
        self.points.last().map_or(f64::NAN, |p| p.market)
    }
}

/// Run the backtest over `frame`.
///
/// Returns are computed on the full frame first; rows with an undefined
/// return or indicator are dropped afterwards. At least two rows must remain.
pub fn run(frame: &SignalFrame) -> Result<(AugmentedSeries, CumulativeCurves)> {
    let signals = frame.signals()?;
    let bars = frame.bars();

    let mut keep = vec![false; bars.len()];
    let mut rows = Vec::with_capacity(bars.len());
    for i in 1..bars.len() {
        if !frame.is_complete(i) {
            continue;
        }
        let market_return = bars[i].close / bars[i - 1].close - 1.0;
        if !market_return.is_finite() {
            continue;
        }
        keep[i] = true;
        rows.push(BacktestRow {
            timestamp: bars[i].timestamp,
            close: bars[i].close,
            signal: signals[i],
            market_return,
            strategy_return: signals[i - 1].as_f64() * market_return,
        });
    }

    if rows.len() < 2 {
        return Err(BacktestError::InsufficientData(format!(
            "{} usable rows out of {} bars, need at least 2",
            rows.len(),
            bars.len()
        )));
    }

    debug!(
        bars = bars.len(),
        retained = rows.len(),
        "computed strategy returns"
    );

    let curves = CumulativeCurves::from_rows(&rows);
    let series = AugmentedSeries {
        frame: frame.filter_rows(&keep)?,
        rows,
    };
    Ok((series, curves))
}
