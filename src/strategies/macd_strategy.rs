//! MACD-based Strategy.
//!
//! Uses the Moving Average Convergence Divergence indicator to identify
//! trend changes and momentum.

use crate::data::macd;
use crate::error::{BacktestError, Result};
use crate::frame::SignalFrame;
use crate::strategy::SignalGenerator;
use crate::types::Signal;

/// MACD Strategy.
///
/// # Parameters
/// - `fast_period`: Fast EMA span (default: 12)
/// - `slow_period`: Slow EMA span (default: 26)
/// - `signal_period`: Signal line EMA span (default: 9)
///
/// # Signals
/// - Long: MACD line above the signal line
/// - Short: MACD line below the signal line
#[derive(Debug, Clone)]
pub struct MacdCrossover {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl MacdCrossover {
    /// Create a new MACD strategy with custom parameters.
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Result<Self> {
        if fast_period == 0 || fast_period >= slow_period {
            return Err(BacktestError::ConfigError(format!(
                "MACD spans must satisfy 0 < fast < slow, got {}/{}",
                fast_period, slow_period
            )));
        }
        if signal_period == 0 {
            return Err(BacktestError::ConfigError(
                "MACD signal span must be positive".to_string(),
            ));
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
        })
    }

    /// Create with default parameters (12/26/9).
    pub fn default_params() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl SignalGenerator for MacdCrossover {
    fn name(&self) -> &str {
        "MACD Crossover"
    }

    fn generate(&self, frame: &SignalFrame) -> Result<SignalFrame> {
        let (macd_line, signal_line) = macd(
            &frame.closes(),
            self.fast_period,
            self.slow_period,
            self.signal_period,
        );

        let signals = macd_line
            .iter()
            .zip(&signal_line)
            .map(|(m, s)| {
                if m > s {
                    Signal::Long
                } else if m < s {
                    Signal::Short
                } else {
                    Signal::Flat
                }
            })
            .collect();

        frame
            .clone()
            .with_indicator("MACD", macd_line.into_iter().map(Some).collect())?
            .with_indicator("SignalLine", signal_line.into_iter().map(Some).collect())?
            .with_signals(signals)
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("fast_period".to_string(), self.fast_period.to_string()),
            ("slow_period".to_string(), self.slow_period.to_string()),
            ("signal_period".to_string(), self.signal_period.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn frame_from(closes: &[f64]) -> SignalFrame {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        SignalFrame::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar::from_close(start + Duration::days(i as i64), c))
                .collect(),
        )
    }

    #[test]
    fn test_macd_strategy_creation() {
        let strategy = MacdCrossover::new(12, 26, 9).unwrap();
        assert_eq!(strategy.fast_period, 12);
        assert_eq!(strategy.slow_period, 26);
        assert_eq!(strategy.signal_period, 9);
    }

    #[test]
    fn test_invalid_periods() {
        assert!(MacdCrossover::new(26, 12, 9).is_err());
        assert!(MacdCrossover::new(12, 26, 0).is_err());
    }

    #[test]
    fn test_first_bar_is_flat() {
        // All EMAs start at the first close, so MACD equals its signal line.
        let out = MacdCrossover::default_params()
            .generate(&frame_from(&[100.0, 101.0, 102.0]))
            .unwrap();
        assert_eq!(out.signals().unwrap()[0], Signal::Flat);
        assert!(out.is_complete(0));
    }

    #[test]
    fn test_macd_on_trending_data() {
        let up: Vec<f64> = (0..60).map(|i| 100.0 + 0.5 * i as f64).collect();
        let out = MacdCrossover::default_params().generate(&frame_from(&up)).unwrap();
        assert!(out.signals().unwrap()[1..].iter().all(|&s| s == Signal::Long));

        let down: Vec<f64> = (0..60).map(|i| 100.0 - 0.5 * i as f64).collect();
        let out = MacdCrossover::default_params().generate(&frame_from(&down)).unwrap();
        assert!(out.signals().unwrap()[1..].iter().all(|&s| s == Signal::Short));
    }
}
