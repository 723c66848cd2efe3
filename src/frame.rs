//! Immutable price table passed between pipeline stages.
//!
//! A [`SignalFrame`] owns the bars of one ticker plus any indicator columns a
//! signal generator attached and, once a generator has run, the signal
//! column. Stages never mutate a frame they were handed; the builder methods
//! consume `self` and return the extended frame.

use crate::error::{BacktestError, Result};
use crate::types::{Bar, Signal};

/// Name of the signal column, used in error messages.
pub const SIGNAL_COLUMN: &str = "Signal";

/// Bars of a single ticker with derived columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFrame {
    bars: Vec<Bar>,
    indicators: Vec<(String, Vec<Option<f64>>)>,
    signals: Option<Vec<Signal>>,
}

impl SignalFrame {
    /// Wrap a time-ordered bar series.
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            indicators: Vec::new(),
            signals: None,
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Closing prices in bar order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Attach a named indicator column. `None` marks rows where the
    /// indicator is undefined; such rows are dropped by the engine.
    pub fn with_indicator(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        self.check_len(&name, values.len())?;
        match self.indicators.iter_mut().find(|(n, _)| *n == name) {
            Some((_, column)) => *column = values,
            None => self.indicators.push((name, values)),
        }
        Ok(self)
    }

    /// Attach the signal column.
    pub fn with_signals(mut self, signals: Vec<Signal>) -> Result<Self> {
        self.check_len(SIGNAL_COLUMN, signals.len())?;
        self.signals = Some(signals);
        Ok(self)
    }

    /// The signal column, or `MissingColumn` if no generator has run.
    pub fn signals(&self) -> Result<&[Signal]> {
        self.signals
            .as_deref()
            .ok_or_else(|| BacktestError::MissingColumn(SIGNAL_COLUMN.to_string()))
    }

    pub fn has_signals(&self) -> bool {
        self.signals.is_some()
    }

    /// Look up an indicator column by name.
    pub fn indicator(&self, name: &str) -> Option<&[Option<f64>]> {
        self.indicators
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Names of the attached indicator columns, in insertion order.
    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|(n, _)| n.as_str())
    }

    /// True when every indicator column is defined at `index`.
    pub fn is_complete(&self, index: usize) -> bool {
        self.indicators
            .iter()
            .all(|(_, column)| column.get(index).copied().flatten().is_some())
    }

    /// Build a new frame keeping only rows where `keep` is true.
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        self.check_len("row mask", keep.len())?;
        let rows: Vec<usize> = (0..self.len()).filter(|&i| keep[i]).collect();

        Ok(Self {
            bars: rows.iter().map(|&i| self.bars[i].clone()).collect(),
            indicators: self
                .indicators
                .iter()
                .map(|(name, column)| (name.clone(), rows.iter().map(|&i| column[i]).collect()))
                .collect(),
            signals: self
                .signals
                .as_ref()
                .map(|s| rows.iter().map(|&i| s[i]).collect()),
        })
    }

    fn check_len(&self, column: &str, len: usize) -> Result<()> {
        if len != self.bars.len() {
            return Err(BacktestError::DataError(format!(
                "column '{}' has {} rows, frame has {}",
                column,
                len,
                self.bars.len()
            )));
        }
        Ok(())
    }
}
