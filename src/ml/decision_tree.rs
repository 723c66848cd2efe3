//! Binary classification tree (Gini impurity).

use super::Dataset;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Decision tree configuration
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Maximum depth of tree (None = grow until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Features examined per split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for feature sampling
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        /// Fraction of positive labels reaching this leaf.
        p_up: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Decision Tree model
#[derive(Debug, Clone)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<Node>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self { config, root: None }
    }

    /// Train on every row of `data`.
    pub fn fit(&mut self, data: &Dataset) {
        let indices: Vec<usize> = (0..data.n_samples()).collect();
        self.fit_indices(data, &indices);
    }

    /// Train on the rows listed in `indices`; repeats are allowed (bootstrap).
    pub fn fit_indices(&mut self, data: &Dataset, indices: &[usize]) {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.root = Some(self.build(data, indices.to_vec(), 0, &mut rng));
    }

    fn build(&self, data: &Dataset, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let n = indices.len();
        let positives = indices.iter().filter(|&&i| data.labels[i] > 0.0).count();
        let p_up = if n == 0 { 0.5 } else { positives as f64 / n as f64 };

        let depth_reached = self.config.max_depth.map_or(false, |d| depth >= d);
        if depth_reached || n < self.config.min_samples_split || positives == 0 || positives == n {
            return Node::Leaf { p_up };
        }

        match self.best_split(data, &indices, positives, rng) {
            Some((feature, threshold)) => {
                let (left, right): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| data.features[i][feature] <= threshold);
                Node::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(data, left, depth + 1, rng)),
                    right: Box::new(self.build(data, right, depth + 1, rng)),
                }
            }
            None => Node::Leaf { p_up },
        }
    }

    /// Sweep each sampled feature in sorted order and keep the threshold with
    /// the lowest weighted child impurity. Constant features do not count
    /// towards `max_features`.
    fn best_split(
        &self,
        data: &Dataset,
        indices: &[usize],
        positives: usize,
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let n_features = data.n_features();
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let max_features = self
            .config
            .max_features
            .unwrap_or(n_features)
            .clamp(1, n_features.max(1));

        let mut order: Vec<usize> = (0..n_features).collect();
        order.shuffle(rng);

        let mut best: Option<(f64, usize, f64)> = None;
        let mut visited = 0;
        let mut column: Vec<(f64, bool)> = Vec::with_capacity(n);

        for feature in order {
            if visited >= max_features && best.is_some() {
                break;
            }

            column.clear();
            column.extend(
                indices
                    .iter()
                    .map(|&i| (data.features[i][feature], data.labels[i] > 0.0)),
            );
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            if column[0].0 == column[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left_pos = 0;
            for k in 1..n {
                if column[k - 1].1 {
                    left_pos += 1;
                }
                let (lo, hi) = (column[k - 1].0, column[k].0);
                if lo == hi || k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let impurity = weighted_gini(left_pos, k, positives - left_pos, n - k);
                if best.map_or(true, |(b, _, _)| impurity < b) {
                    best = Some((impurity, feature, midpoint(lo, hi)));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }

    /// Probability of the positive class for one sample.
    pub fn predict_proba_one(&self, features: &[f64]) -> f64 {
        let mut node = match &self.root {
            Some(n) => n,
            None => return 0.5,
        };
        loop {
            match node {
                Node::Leaf { p_up } => return *p_up,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Predicted label (`+1.0` / `-1.0`) for one sample.
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        if self.predict_proba_one(features) > 0.5 {
            1.0
        } else {
            -1.0
        }
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, Node::depth)
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

fn weighted_gini(left_pos: usize, n_left: usize, right_pos: usize, n_right: usize) -> f64 {
    let n = (n_left + n_right) as f64;
    (n_left as f64 * gini(left_pos, n_left) + n_right as f64 * gini(right_pos, n_right)) / n
}

/// Threshold strictly below `hi` so that `hi` always goes right.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo / 2.0 + hi / 2.0;
    if mid >= hi || !mid.is_finite() {
        lo
    } else {
        mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_dataset() -> Dataset {
        let features: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64 / 10.0]).collect();
        let labels = features
            .iter()
            .map(|f| if f[0] > 5.0 { 1.0 } else { -1.0 })
            .collect();
        Dataset::new(features, labels)
    }

    #[test]
    fn test_learns_step_function() {
        let data = step_dataset();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&data);

        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.predict_one(&[2.0]), -1.0);
        assert_eq!(tree.predict_one(&[7.5]), 1.0);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let data = Dataset::new(vec![vec![1.0], vec![2.0]], vec![1.0, 1.0]);
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&data);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_proba_one(&[0.0]), 1.0);
    }

    #[test]
    fn test_constant_features_cannot_split() {
        let data = Dataset::new(vec![vec![3.0]; 4], vec![1.0, -1.0, 1.0, -1.0]);
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&data);
        assert_eq!(tree.depth(), 1);
        // Tie at 0.5 resolves to the negative class.
        assert_eq!(tree.predict_one(&[3.0]), -1.0);
    }

    #[test]
    fn test_max_depth_respected() {
        let features: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let labels = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut tree = DecisionTree::new(TreeConfig {
            max_depth: Some(3),
            ..Default::default()
        });
        tree.fit(&Dataset::new(features, labels));
        assert!(tree.depth() <= 4);
    }

    #[test]
    fn test_midpoint_stays_below_hi() {
        assert_eq!(midpoint(1.0, 3.0), 2.0);
        let hi = 1.0_f64;
        let lo = f64::from_bits(hi.to_bits() - 1);
        assert!(midpoint(lo, hi) < hi);
    }
}
