// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Reference Gaussian-Process Dynamics Model
// ─────────────────────────────────────────────────────────────────────
//! Scalar GP regressor with RBF kernel and linear prior mean.
//!
//!   k(x, x') = σ² · exp(−(x − x')² / (2ℓ²))
//!   m(x)     = a·x
//!
//! The Cholesky factor of K + σ_n²·I grows by one row per observation,
//! so each update costs O(n²) instead of a full O(n³) refactorization.

use safeset_types::{GpConfig, SafeSetError, SafeSetResult};

use crate::model::DynamicsModel;

/// Gaussian-process posterior over the scalar dynamics f.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    length_scale: f64,
    signal_variance: f64,
    noise_variance: f64,
    prior_mean_slope: f64,
    x_train: Vec<f64>,
    y_train: Vec<f64>,
    /// Lower-triangular Cholesky factor; row i holds i + 1 entries.
    chol: Vec<Vec<f64>>,
    /// (K + σ_n²·I)⁻¹ · (y − m(X)).
    alpha: Vec<f64>,
}

impl GaussianProcess {
    pub fn new(
        length_scale: f64,
        signal_variance: f64,
        noise_variance: f64,
        prior_mean_slope: f64,
    ) -> SafeSetResult<Self> {
        if !(length_scale.is_finite() && length_scale > 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "length_scale must be > 0, got {length_scale}"
            )));
        }
        if !(signal_variance.is_finite() && signal_variance > 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "signal_variance must be > 0, got {signal_variance}"
            )));
        }
        if !(noise_variance.is_finite() && noise_variance >= 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "noise_variance must be >= 0, got {noise_variance}"
            )));
        }
        if !prior_mean_slope.is_finite() {
            return Err(SafeSetError::Configuration(format!(
                "prior_mean_slope must be finite, got {prior_mean_slope}"
            )));
        }
        Ok(Self {
            length_scale,
            signal_variance,
            noise_variance,
            prior_mean_slope,
            x_train: Vec::new(),
            y_train: Vec::new(),
            chol: Vec::new(),
            alpha: Vec::new(),
        })
    }

    pub fn from_config(cfg: &GpConfig) -> SafeSetResult<Self> {
        Self::new(
            cfg.length_scale,
            cfg.signal_variance,
            cfg.noise_variance,
            cfg.prior_mean_slope,
        )
    }

    pub fn n_observations(&self) -> usize {
        self.x_train.len()
    }

    #[inline]
    fn kernel(&self, a: f64, b: f64) -> f64 {
        let d = a - b;
        self.signal_variance * (-d * d / (2.0 * self.length_scale * self.length_scale)).exp()
    }

    #[inline]
    fn prior_mean(&self, x: f64) -> f64 {
        self.prior_mean_slope * x
    }

    /// Solve L·z = b by forward substitution.
    fn forward_solve(chol: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
        let mut z = vec![0.0; b.len()];
        for i in 0..b.len() {
            let row = &chol[i];
            let mut sum = b[i];
            for j in 0..i {
                sum -= row[j] * z[j];
            }
            z[i] = sum / row[i];
        }
        z
    }

    /// Solve Lᵀ·z = b by backward substitution.
    fn backward_solve(chol: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
        let n = b.len();
        let mut z = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = b[i];
            for j in (i + 1)..n {
                sum -= chol[j][i] * z[j];
            }
            z[i] = sum / chol[i][i];
        }
        z
    }

    fn refresh_alpha(&mut self) {
        let residual: Vec<f64> = self
            .x_train
            .iter()
            .zip(&self.y_train)
            .map(|(&x, &y)| y - self.prior_mean(x))
            .collect();
        let z = Self::forward_solve(&self.chol, &residual);
        self.alpha = Self::backward_solve(&self.chol, &z);
    }

    /// Posterior mean and variance at a single point.
    pub fn predict_point(&self, x: f64) -> (f64, f64) {
        if self.x_train.is_empty() {
            return (self.prior_mean(x), self.signal_variance);
        }
        let k_star: Vec<f64> = self.x_train.iter().map(|&xi| self.kernel(xi, x)).collect();
        let mean = self.prior_mean(x)
            + k_star
                .iter()
                .zip(&self.alpha)
                .map(|(k, a)| k * a)
                .sum::<f64>();
        let v = Self::forward_solve(&self.chol, &k_star);
        let variance = self.signal_variance - v.iter().map(|vi| vi * vi).sum::<f64>();
        (mean, variance.max(0.0))
    }
}

impl DynamicsModel for GaussianProcess {
    fn predict(&self, points: &[f64]) -> SafeSetResult<(Vec<f64>, Vec<f64>)> {
        let mut mean = Vec::with_capacity(points.len());
        let mut variance = Vec::with_capacity(points.len());
        for &x in points {
            let (m, v) = self.predict_point(x);
            mean.push(m);
            variance.push(v);
        }
        Ok((mean, variance))
    }

    fn update(&mut self, state: f64, value: f64) -> SafeSetResult<()> {
        // New Cholesky row: l = L⁻¹·k(X, x), d = sqrt(k(x,x) + σ_n² − lᵀl).
        let k_vec: Vec<f64> = self.x_train.iter().map(|&xi| self.kernel(xi, state)).collect();
        let mut row = Self::forward_solve(&self.chol, &k_vec);
        let diag2 = self.kernel(state, state) + self.noise_variance
            - row.iter().map(|r| r * r).sum::<f64>();
        if !(diag2.is_finite() && diag2 > 1e-12 * self.signal_variance) {
            return Err(SafeSetError::ModelUnavailable(format!(
                "GP covariance not positive definite after adding x = {state:.6} \
                 (pivot {diag2:.3e}); increase noise_variance or drop duplicate states"
            )));
        }
        row.push(diag2.sqrt());

        self.chol.push(row);
        self.x_train.push(state);
        self.y_train.push(value);
        self.refresh_alpha();
        Ok(())
    }
}
