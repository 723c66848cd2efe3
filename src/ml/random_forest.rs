//! Random forest classifier: bootstrap-aggregated [`DecisionTree`]s.

use super::{Dataset, DecisionTree, TreeConfig};
use crate::error::{BacktestError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

/// Random forest configuration
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of trees
    pub n_trees: usize,
    /// Maximum depth per tree (None = unlimited)
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split (None = floor(sqrt(n_features)))
    pub max_features: Option<usize>,
    /// Train each tree on a bootstrap resample
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Random Forest model
#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    /// Train the forest. Trees are grown in parallel; each one draws from its
    /// own RNG seeded from `seed + tree_index`, so results do not depend on
    /// thread scheduling.
    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        let n = data.n_samples();
        if n == 0 || data.n_features() == 0 {
            return Err(BacktestError::InsufficientData(
                "cannot fit a forest on an empty training set".to_string(),
            ));
        }
        if self.config.n_trees == 0 {
            return Err(BacktestError::ConfigError(
                "forest needs at least one tree".to_string(),
            ));
        }

        let max_features = self
            .config
            .max_features
            .unwrap_or_else(|| ((data.n_features() as f64).sqrt() as usize).max(1));
        let config = &self.config;

        self.trees = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let mut tree = DecisionTree::new(TreeConfig {
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split,
                    min_samples_leaf: config.min_samples_leaf,
                    max_features: Some(max_features),
                    seed: rng.gen(),
                });
                if config.bootstrap {
                    let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                    tree.fit_indices(data, &sample);
                } else {
                    tree.fit(data);
                }
                tree
            })
            .collect();

        debug!(
            trees = self.trees.len(),
            samples = n,
            max_features,
            "random forest trained"
        );
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean positive-class probability across trees.
    pub fn predict_proba_one(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|t| t.predict_proba_one(features))
            .sum();
        total / self.trees.len() as f64
    }

    /// `+1.0` when the mean probability exceeds 0.5, else `-1.0`.
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        if self.predict_proba_one(features) > 0.5 {
            1.0
        } else {
            -1.0
        }
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.par_iter().map(|r| self.predict_one(r)).collect()
    }
}
