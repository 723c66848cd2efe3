//! Standard scaling of feature columns.

/// Centres each column on its mean and divides by its population standard
/// deviation. Constant columns are only centred.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Learn column statistics from `rows`.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let n_cols = rows.first().map_or(0, Vec::len);
        let n = rows.len() as f64;
        let mut means = vec![0.0; n_cols];
        let mut scales = vec![1.0; n_cols];
        if rows.is_empty() {
            return Self { means, scales };
        }

        for (col, mean) in means.iter_mut().enumerate() {
            *mean = rows.iter().map(|r| r[col]).sum::<f64>() / n;
        }
        for (col, scale) in scales.iter_mut().enumerate() {
            let var = rows.iter().map(|r| (r[col] - means[col]).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            *scale = if std > 0.0 { std } else { 1.0 };
        }

        Self { means, scales }
    }

    /// Apply the learnt scaling.
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(col, v)| (v - self.means[col]) / self.scales[col])
                    .collect()
            })
            .collect()
    }

    pub fn fit_transform(rows: &[Vec<f64>]) -> (Self, Vec<Vec<f64>>) {
        let scaler = Self::fit(rows);
        let scaled = scaler.transform(rows);
        (scaler, scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_columns_are_standardised() {
        let rows = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]];
        let (_, scaled) = StandardScaler::fit_transform(&rows);

        let col0: Vec<f64> = scaled.iter().map(|r| r[0]).collect();
        let mean: f64 = col0.iter().sum::<f64>() / 3.0;
        let var: f64 = col0.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);

        // Constant column is centred, not blown up.
        assert!(scaled.iter().all(|r| r[1] == 0.0));
    }
}
