//! Simple Moving Average Crossover Strategy.
//!
//! Long while the short moving average sits above the long one, short while
//! it sits below, flat when they are equal or either is still warming up.

use crate::data::rolling_mean;
use crate::error::{BacktestError, Result};
use crate::frame::SignalFrame;
use crate::strategy::SignalGenerator;
use crate::types::Signal;

/// SMA Crossover Strategy.
///
/// # Parameters
/// - `short_window`: Period for the short moving average (default: 50)
/// - `long_window`: Period for the long moving average (default: 200)
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    short_window: usize,
    long_window: usize,
}

impl SmaCrossover {
    /// Create a new SMA Crossover strategy.
    pub fn new(short_window: usize, long_window: usize) -> Result<Self> {
        if short_window == 0 || short_window >= long_window {
            return Err(BacktestError::ConfigError(format!(
                "SMA windows must satisfy 0 < short < long, got {}/{}",
                short_window, long_window
            )));
        }
        Ok(Self {
            short_window,
            long_window,
        })
    }

    /// Create with default parameters (50/200).
    pub fn default_params() -> Self {
        Self {
            short_window: 50,
            long_window: 200,
        }
    }
}

impl SignalGenerator for SmaCrossover {
    fn name(&self) -> &str {
        "SMA Crossover"
    }

    fn generate(&self, frame: &SignalFrame) -> Result<SignalFrame> {
        let closes = frame.closes();
        let short = rolling_mean(&closes, self.short_window);
        let long = rolling_mean(&closes, self.long_window);

        let signals = short
            .iter()
            .zip(&long)
            .map(|(s, l)| match (s, l) {
                (Some(s), Some(l)) if s > l => Signal::Long,
                (Some(s), Some(l)) if s < l => Signal::Short,
                _ => Signal::Flat,
            })
            .collect();

        frame
            .clone()
            .with_indicator(format!("SMA{}", self.short_window), short)?
            .with_indicator(format!("SMA{}", self.long_window), long)?
            .with_signals(signals)
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("short_window".to_string(), self.short_window.to_string()),
            ("long_window".to_string(), self.long_window.to_string()),
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
    fn test_sma_crossover_creation() {
        let strategy = SmaCrossover::new(5, 20).unwrap();
        assert_eq!(strategy.short_window, 5);
        assert_eq!(strategy.long_window, 20);
        assert_eq!(SmaCrossover::default_params().long_window, 200);
    }

    #[test]
    fn test_invalid_windows() {
        assert!(SmaCrossover::new(20, 5).is_err());
        assert!(SmaCrossover::new(0, 5).is_err());
    }

    #[test]
    fn test_signals_follow_average_ordering() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let out = SmaCrossover::new(2, 4).unwrap().generate(&frame_from(&closes)).unwrap();
        let signals = out.signals().unwrap();

        // Warm-up rows stay flat and carry undefined indicators.
        assert_eq!(&signals[..3], &[Signal::Flat; 3]);
        assert!(!out.is_complete(2));
        // Rising prices keep the short average above the long one.
        assert!(signals[3..].iter().all(|&s| s == Signal::Long));
        assert!(out.indicator("SMA2").is_some());
        assert!(out.indicator("SMA4").is_some());
    }

    #[test]
    fn test_downtrend_goes_short() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        let out = SmaCrossover::new(2, 4).unwrap().generate(&frame_from(&closes)).unwrap();
        assert_eq!(*out.signals().unwrap().last().unwrap(), Signal::Short);
    }

    #[test]
    fn test_input_frame_untouched() {
        let input = frame_from(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let _ = SmaCrossover::new(2, 3).unwrap().generate(&input).unwrap();
        assert!(!input.has_signals());
    }
}
