//! Signal generator trait and the strategy registry.

use crate::error::{BacktestError, Result};
use crate::frame::SignalFrame;
use crate::strategies::{MacdCrossover, RandomForestSignals, RsiThreshold, SmaCrossover};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Turns a price table into a table carrying a signal column.
///
/// Implementations must only use bars up to and including the current one
/// when computing a bar's signal, must not modify the input frame, and must
/// return a frame with [`SignalFrame::with_signals`] applied.
pub trait SignalGenerator: Send + Sync {
    /// Returns the name of the strategy.
    fn name(&self) -> &str;

    /// Produce a new frame with the signal column attached.
    fn generate(&self, frame: &SignalFrame) -> Result<SignalFrame>;

    /// Get strategy parameters as key-value pairs for logging.
    fn parameters(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// The built-in strategies, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyKind {
    Sma,
    Rsi,
    Macd,
    Ml,
}

/// Name/description/kind entries; the single source for lookups and help text.
const REGISTRY: &[(&str, &str, StrategyKind)] = &[
    ("SMA", "Moving-average crossover (short 50 / long 200)", StrategyKind::Sma),
    ("RSI", "RSI threshold (period 14, buy < 30, sell > 70)", StrategyKind::Rsi),
    ("MACD", "MACD vs signal line (12 / 26 / 9)", StrategyKind::Macd),
    ("ML", "Random-forest direction classifier (100 trees)", StrategyKind::Ml),
];

impl StrategyKind {
    /// All strategies in registry order.
    pub fn all() -> impl Iterator<Item = StrategyKind> {
        REGISTRY.iter().map(|(_, _, kind)| *kind)
    }

    /// Registry name, e.g. `"SMA"`.
    pub fn as_str(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, _, kind)| *kind == self)
            .map(|(name, _, _)| *name)
            .unwrap_or("?")
    }

    /// One-line description for help output.
    pub fn description(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, _, kind)| *kind == self)
            .map(|(_, desc, _)| *desc)
            .unwrap_or("")
    }

    /// Instantiate the generator for this kind.
    pub fn build(self, params: &StrategyParams) -> Result<Box<dyn SignalGenerator>> {
        Ok(match self {
            StrategyKind::Sma => Box::new(SmaCrossover::new(params.sma_short, params.sma_long)?),
            StrategyKind::Rsi => Box::new(RsiThreshold::new(
                params.rsi_period,
                params.rsi_lower,
                params.rsi_upper,
            )?),
            StrategyKind::Macd => Box::new(MacdCrossover::new(
                params.macd_fast,
                params.macd_slow,
                params.macd_signal,
            )?),
            StrategyKind::Ml => Box::new(
                RandomForestSignals::new(params.ml_trees, params.ml_test_size)?
                    .with_seed(params.ml_seed),
            ),
        })
    }
}

impl FromStr for StrategyKind {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_uppercase();
        REGISTRY
            .iter()
            .find(|(name, _, _)| *name == wanted)
            .map(|(_, _, kind)| *kind)
            .ok_or_else(|| {
                let names: Vec<&str> = REGISTRY.iter().map(|(n, _, _)| *n).collect();
                BacktestError::ConfigError(format!(
                    "Invalid strategy selected: '{}' (expected one of {})",
                    s.trim(),
                    names.join(", ")
                ))
            })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tunable parameters for every built-in strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub sma_short: usize,
    pub sma_long: usize,
    pub rsi_period: usize,
    pub rsi_lower: f64,
    pub rsi_upper: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ml_trees: usize,
    pub ml_seed: u64,
    pub ml_test_size: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            sma_short: 50,
            sma_long: 200,
            rsi_period: 14,
            rsi_lower: 30.0,
            rsi_upper: 70.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ml_trees: 100,
            ml_seed: 42,
            ml_test_size: 0.2,
        }
    }
}
