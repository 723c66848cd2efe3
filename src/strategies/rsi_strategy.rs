//! RSI threshold strategy.
//!
//! Uses the Relative Strength Index to identify overbought and oversold conditions.

use crate::data::rsi;
use crate::error::{BacktestError, Result};
use crate::frame::SignalFrame;
use crate::strategy::SignalGenerator;
use crate::types::Signal;

/// RSI Strategy.
///
/// # Parameters
/// - `period`: RSI calculation period (default: 14)
/// - `lower`: RSI level considered oversold (default: 30)
/// - `upper`: RSI level considered overbought (default: 70)
///
/// # Signals
/// - Long: RSI below `lower`
/// - Short: RSI above `upper`
/// - Flat: otherwise, or while RSI is undefined
#[derive(Debug, Clone)]
pub struct RsiThreshold {
    period: usize,
    lower: f64,
    upper: f64,
}

impl RsiThreshold {
    /// Create a new RSI strategy.
    pub fn new(period: usize, lower: f64, upper: f64) -> Result<Self> {
        if period == 0 {
            return Err(BacktestError::ConfigError(
                "RSI period must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper {
            return Err(BacktestError::ConfigError(format!(
                "RSI thresholds must satisfy 0 <= lower < upper <= 100, got {}/{}",
                lower, upper
            )));
        }
        Ok(Self {
            period,
            lower,
            upper,
        })
    }

    /// Create with default parameters (14, 30, 70).
    pub fn default_params() -> Self {
        Self {
            period: 14,
            lower: 30.0,
            upper: 70.0,
        }
    }
}

impl SignalGenerator for RsiThreshold {
    fn name(&self) -> &str {
        "RSI Threshold"
    }

    fn generate(&self, frame: &SignalFrame) -> Result<SignalFrame> {
        let values = rsi(&frame.closes(), self.period);
        let signals = values
            .iter()
            .map(|v| match v {
                Some(r) if *r < self.lower => Signal::Long,
                Some(r) if *r > self.upper => Signal::Short,
                _ => Signal::Flat,
            })
            .collect();

        frame
            .clone()
            .with_indicator("RSI", values)?
            .with_signals(signals)
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("period".to_string(), self.period.to_string()),
            ("lower".to_string(), format!("{:.0}", self.lower)),
            ("upper".to_string(), format!("{:.0}", self.upper)),
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
    fn test_rsi_strategy_creation() {
        let strategy = RsiThreshold::new(14, 30.0, 70.0).unwrap();
        assert_eq!(strategy.period, 14);
        assert_eq!(strategy.lower, 30.0);
        assert_eq!(strategy.upper, 70.0);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(RsiThreshold::new(0, 30.0, 70.0).is_err());
        assert!(RsiThreshold::new(14, 70.0, 30.0).is_err());
        assert!(RsiThreshold::new(14, -1.0, 70.0).is_err());
    }

    #[test]
    fn test_rsi_parameters() {
        let params = RsiThreshold::default_params().parameters();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].1, "14");
    }

    #[test]
    fn test_overbought_rally_goes_short() {
        let closes: Vec<f64> = (0..8).map(|i| 100.0 + i as f64).collect();
        let out = RsiThreshold::new(3, 30.0, 70.0).unwrap().generate(&frame_from(&closes)).unwrap();
        let signals = out.signals().unwrap();
        assert_eq!(signals[0], Signal::Flat);
        assert!(signals[2..].iter().all(|&s| s == Signal::Short));
    }

    #[test]
    fn test_oversold_selloff_goes_long() {
        let closes: Vec<f64> = (0..8).map(|i| 100.0 - i as f64).collect();
        let out = RsiThreshold::new(3, 30.0, 70.0).unwrap().generate(&frame_from(&closes)).unwrap();
        assert!(out.signals().unwrap()[3..].iter().all(|&s| s == Signal::Long));
    }

    #[test]
    fn test_flat_prices_leave_rsi_undefined() {
        let out = RsiThreshold::new(3, 30.0, 70.0)
            .unwrap()
            .generate(&frame_from(&[10.0; 6]))
            .unwrap();
        assert!(out.signals().unwrap().iter().all(|&s| s == Signal::Flat));
        assert!((0..6).all(|i| !out.is_complete(i)));
    }
}
