//! Small supervised-learning toolkit backing the ML signal generator.
//!
//! - [`StandardScaler`]: zero-mean / unit-variance feature scaling
//! - [`DecisionTree`]: binary Gini classification tree
//! - [`RandomForest`]: bootstrap-aggregated trees with per-split feature sampling

mod decision_tree;
mod random_forest;
mod scaler;

pub use decision_tree::{DecisionTree, TreeConfig};
pub use random_forest::{ForestConfig, RandomForest};
pub use scaler::StandardScaler;

/// Feature matrix with binary labels (`+1.0` / `-1.0`).
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Feature matrix (n_samples x n_features)
    pub features: Vec<Vec<f64>>,
    /// Target labels
    pub labels: Vec<f64>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<f64>) -> Self {
        debug_assert_eq!(features.len(), labels.len());
        Self { features, labels }
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// First `n` rows, in order.
    pub fn head(&self, n: usize) -> Dataset {
        let n = n.min(self.n_samples());
        Dataset {
            features: self.features[..n].to_vec(),
            labels: self.labels[..n].to_vec(),
        }
    }
}
