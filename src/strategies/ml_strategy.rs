//! Machine Learning Strategy.
//!
//! A random-forest classifier trained on five technical features to predict
//! whether the next bar closes higher.
//!
//! # Features
//!
//! | Column       | Definition                                     |
//! |--------------|------------------------------------------------|
//! | `SMA_10`     | 10-bar simple moving average of close          |
//! | `SMA_50`     | 50-bar simple moving average of close          |
//! | `RSI`        | 14-bar RSI                                     |
//! | `Momentum`   | close minus the close 10 bars earlier          |
//! | `Volatility` | 10-bar sample stdev of percentage returns      |
//!
//! Rows where any feature is undefined are removed from the output frame.
//!
//! # Look-ahead warning
//!
//! The forest is fitted on the first 80% of rows (chronological, no shuffle)
//! and then predicts **every** row, including the ones it was trained on.
//! Its training labels are built from the *next* bar's return. The resulting
//! signals therefore leak future information into the backtest: this is not a
//! statistically valid out-of-sample evaluation, and ML results should not be
//! compared against the technical strategies as if it were.

use crate::data::{pct_change, rolling_mean, rolling_std, rsi};
use crate::error::{BacktestError, Result};
use crate::frame::SignalFrame;
use crate::ml::{Dataset, ForestConfig, RandomForest, StandardScaler};
use crate::strategy::SignalGenerator;
use crate::types::Signal;
use tracing::{debug, info};

/// Feature column names in model input order.
pub const FEATURE_COLUMNS: [&str; 5] = ["SMA_10", "SMA_50", "RSI", "Momentum", "Volatility"];

const MOMENTUM_LAG: usize = 10;

/// Random-forest direction classifier.
///
/// # Parameters
/// - `n_trees`: Forest size (default: 100)
/// - `test_size`: Fraction of rows held back from training (default: 0.2)
/// - `seed`: Random seed for bootstrap and feature sampling (default: 42)
///
/// # Signals
/// - Long: model predicts the next return is positive
/// - Short: otherwise
#[derive(Debug, Clone)]
pub struct RandomForestSignals {
    n_trees: usize,
    test_size: f64,
    seed: u64,
}

impl RandomForestSignals {
    pub fn new(n_trees: usize, test_size: f64) -> Result<Self> {
        if n_trees == 0 {
            return Err(BacktestError::ConfigError(
                "ML strategy needs at least one tree".to_string(),
            ));
        }
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(BacktestError::ConfigError(format!(
                "ML test fraction must be in (0, 1), got {}",
                test_size
            )));
        }
        Ok(Self {
            n_trees,
            test_size,
            seed: 42,
        })
    }

    /// Create with default parameters (100 trees, 20% held out, seed 42).
    pub fn default_params() -> Self {
        Self {
            n_trees: 100,
            test_size: 0.2,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of leading rows used for training out of `n`.
    fn train_len(&self, n: usize) -> usize {
        let test = (self.test_size * n as f64).ceil() as usize;
        n.saturating_sub(test)
    }
}

/// Per-row feature columns over the full frame, in [`FEATURE_COLUMNS`] order.
fn feature_columns(closes: &[f64]) -> [Vec<Option<f64>>; 5] {
    let returns = pct_change(closes);
    let momentum = (0..closes.len())
        .map(|i| {
            if i >= MOMENTUM_LAG {
                Some(closes[i] - closes[i - MOMENTUM_LAG])
            } else {
                None
            }
        })
        .collect();

    [
        rolling_mean(closes, 10),
        rolling_mean(closes, 50),
        rsi(closes, 14),
        momentum,
        rolling_std(&returns, 10),
    ]
}

impl SignalGenerator for RandomForestSignals {
    fn name(&self) -> &str {
        "Random Forest"
    }

    fn generate(&self, frame: &SignalFrame) -> Result<SignalFrame> {
        let closes = frame.closes();
        let columns = feature_columns(&closes);
        let returns = pct_change(&closes);

        let keep: Vec<bool> = (0..frame.len())
            .map(|i| columns.iter().all(|c| c[i].is_some()))
            .collect();
        let rows: Vec<usize> = (0..frame.len()).filter(|&i| keep[i]).collect();

        let train_len = self.train_len(rows.len());
        if train_len == 0 {
            return Err(BacktestError::InsufficientData(format!(
                "ML strategy has {} complete feature rows out of {} bars",
                rows.len(),
                frame.len()
            )));
        }

        let features: Vec<Vec<f64>> = rows
            .iter()
            .map(|&i| columns.iter().filter_map(|c| c[i]).collect())
            .collect();

        // Label: does the next retained row have a positive return?
        let labels: Vec<f64> = (0..rows.len())
            .map(|j| match rows.get(j + 1).and_then(|&next| returns[next]) {
                Some(r) if r > 0.0 => 1.0,
                _ => -1.0,
            })
            .collect();

        let (_, scaled) = StandardScaler::fit_transform(&features);
        let dataset = Dataset::new(scaled, labels);

        let mut forest = RandomForest::new(ForestConfig {
            n_trees: self.n_trees,
            seed: self.seed,
            ..Default::default()
        });
        forest.fit(&dataset.head(train_len))?;
        info!(
            rows = rows.len(),
            train_rows = train_len,
            trees = self.n_trees,
            "fitted ML model; predicting all rows (in-sample)"
        );

        let signals: Vec<Signal> = forest
            .predict(&dataset.features)
            .into_iter()
            .map(|p| if p > 0.0 { Signal::Long } else { Signal::Short })
            .collect();
        debug!(
            longs = signals.iter().filter(|&&s| s == Signal::Long).count(),
            shorts = signals.iter().filter(|&&s| s == Signal::Short).count(),
            "ML signals"
        );

        let mut out = frame.filter_rows(&keep)?;
        for (name, column) in FEATURE_COLUMNS.iter().zip(columns) {
            let kept = column
                .into_iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v)
                .collect();
            out = out.with_indicator(*name, kept)?;
        }
        out.with_signals(signals)
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("n_trees".to_string(), self.n_trees.to_string()),
            ("test_size".to_string(), self.test_size.to_string()),
            ("seed".to_string(), self.seed.to_string()),
        ]
    }
}
