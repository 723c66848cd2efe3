//! Core data types for the backtester.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BacktestError;

/// Daily price bar.
///
/// Only `close` is required; the remaining fields are carried when the
/// provider has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
}

impl Bar {
    /// Create a full OHLCV bar.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            adj_close: None,
            volume: Some(volume),
        }
    }

    /// Create a bar that only knows its closing price.
    pub fn from_close(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            adj_close: None,
            volume: None,
        }
    }

    /// Attach an adjusted close.
    pub fn with_adj_close(mut self, adj_close: f64) -> Self {
        self.adj_close = Some(adj_close);
        self
    }

    /// Close is finite and strictly positive, so returns are defined.
    pub fn has_usable_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }

    /// Validate that bar data is consistent.
    pub fn validate(&self) -> bool {
        if !self.has_usable_close() {
            return false;
        }
        if let (Some(high), Some(low)) = (self.high, self.low) {
            if high < low || high < self.close || low > self.close {
                return false;
            }
            if let Some(open) = self.open {
                if open > high || open < low {
                    return false;
                }
            }
        }
        self.volume.map_or(true, |v| v >= 0.0)
    }

    /// Calendar date of the bar.
    pub fn date(&self) -> chrono::NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Discrete position signal attached to each bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Signal {
    /// Short / sell (-1).
    Short,
    /// Flat / no change (0).
    #[default]
    Flat,
    /// Long / buy (+1).
    Long,
}

impl Signal {
    /// Integer encoding in {-1, 0, +1}.
    pub fn as_i8(self) -> i8 {
        match self {
            Signal::Short => -1,
            Signal::Flat => 0,
            Signal::Long => 1,
        }
    }

    /// Position multiplier applied to a return.
    pub fn as_f64(self) -> f64 {
        f64::from(self.as_i8())
    }
}

impl TryFrom<i8> for Signal {
    type Error = BacktestError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Signal::Short),
            0 => Ok(Signal::Flat),
            1 => Ok(Signal::Long),
            other => Err(BacktestError::DataError(format!(
                "signal must be -1, 0 or 1, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

/// Label of a trade event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    /// Label a transition into `signal`: only a move into `Long` is a buy.
    pub fn from_signal(signal: Signal) -> Self {
        if signal == Signal::Long {
            TradeType::Buy
        } else {
            TradeType::Sell
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Buy => write!(f, "Buy"),
            TradeType::Sell => write!(f, "Sell"),
        }
    }
}

/// A bar on which the signal changed from the previous retained bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub trade_type: TradeType,
    pub strategy_return: f64,
}
