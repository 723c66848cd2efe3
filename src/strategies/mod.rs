//! Built-in signal generators.
//!
//! - [`SmaCrossover`]: short/long simple moving average crossover
//! - [`RsiThreshold`]: RSI oversold/overbought thresholds
//! - [`MacdCrossover`]: MACD line against its signal line
//! - [`RandomForestSignals`]: random-forest next-bar direction classifier

mod macd_strategy;
mod ml_strategy;
mod rsi_strategy;
mod sma_crossover;

pub use macd_strategy::MacdCrossover;
pub use ml_strategy::{RandomForestSignals, FEATURE_COLUMNS};
pub use rsi_strategy::RsiThreshold;
pub use sma_crossover::SmaCrossover;
