//! Per-feature standardization fitted with Welford's algorithm.
//!
//! Raw sensor values span several orders of magnitude (rpm in the
//! thousands, torque in tens), so the classifier scales each feature to
//! zero mean and unit variance using statistics fitted on the training set
//! and stored in the artifact.

use serde::{Deserialize, Serialize};

/// Standard deviations below this are treated as a constant feature.
const MIN_STD: f64 = 1e-8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureScaler {
    count: u64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl FeatureScaler {
    /// A scaler that has seen nothing: `transform` is the identity.
    pub fn new(width: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; width],
            m2: vec![0.0; width],
        }
    }

    /// Fit on every row yielded (each `width` values long).
    pub fn fit<'a>(width: usize, rows: impl IntoIterator<Item = &'a [f64]>) -> Self {
        let mut scaler = Self::new(width);
        for row in rows {
            scaler.update(row);
        }
        scaler
    }

    /// Fold one raw row into the running statistics.
    pub fn update(&mut self, raw: &[f64]) {
        self.count += 1;
        let n = self.count as f64;

        for (i, &x) in raw.iter().enumerate().take(self.mean.len()) {
            let delta = x - self.mean[i];
            self.mean[i] += delta / n;
            let delta2 = x - self.mean[i];
            self.m2[i] += delta * delta2;
        }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Sample standard deviation per feature (1.0 until two rows are seen
    /// or when a feature is constant).
    pub fn std(&self) -> Vec<f64> {
        if self.count < 2 {
            return vec![1.0; self.width()];
        }
        let n = self.count as f64;
        self.m2
            .iter()
            .map(|m2| {
                let std = (m2 / (n - 1.0)).sqrt();
                if std < MIN_STD { 1.0 } else { std }
            })
            .collect()
    }

    /// Scale a raw row (or a flattened multi-timestep sequence whose length
    /// is a multiple of the width).
    pub fn transform(&self, raw: &[f64]) -> Vec<f64> {
        if self.count == 0 {
            return raw.to_vec();
        }
        let std = self.std();
        let width = self.width();
        raw.iter()
            .enumerate()
            .map(|(idx, &x)| {
                let i = idx % width;
                (x - self.mean[i]) / std[i]
            })
            .collect()
    }

    /// Whether the stored statistics are usable.
    pub fn is_consistent(&self) -> bool {
        self.mean.len() == self.m2.len()
            && self.mean.iter().chain(&self.m2).all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfitted_is_identity() {
        let s = FeatureScaler::new(3);
        assert_eq!(s.transform(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_welford_mean_and_std() {
        let rows: Vec<Vec<f64>> = (0..1000).map(|i| vec![i as f64, 5.0]).collect();
        let s = FeatureScaler::fit(2, rows.iter().map(Vec::as_slice));

        assert_eq!(s.count(), 1000);
        assert!((s.mean()[0] - 499.5).abs() < 1e-9);
        assert!((s.mean()[1] - 5.0).abs() < 1e-12);

        let std = s.std();
        assert!((std[0] - 288.8194).abs() < 1e-3);
        assert_eq!(std[1], 1.0, "constant column keeps unit scale");
    }

    #[test]
    fn test_transform_standardizes() {
        let rows = [vec![1.0], vec![3.0]];
        let s = FeatureScaler::fit(1, rows.iter().map(Vec::as_slice));
        let out = s.transform(&[2.0]);
        assert!(out[0].abs() < 1e-12);
    }

    #[test]
    fn test_transform_wraps_over_timesteps() {
        let rows = [vec![0.0, 10.0], vec![2.0, 30.0]];
        let s = FeatureScaler::fit(2, rows.iter().map(Vec::as_slice));
        let out = s.transform(&[1.0, 20.0, 1.0, 20.0]);
        assert!(out.iter().all(|v| v.abs() < 1e-12));
    }
}
