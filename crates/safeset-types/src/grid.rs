// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — State-Space Grid
// ─────────────────────────────────────────────────────────────────────
//! Uniform discretization of the scalar state space.
//!
//! x_i = x_min + i·τ for i = 0..N, N = ceil((x_max − x_min) / τ).
//! The interval is half-open: [-1, 1) at τ = 0.001 yields 2000 points.
//! Points are computed from the index, never accumulated, so spacing
//! stays exact up to one rounding per point.

use serde::{Deserialize, Serialize};

use crate::error::{SafeSetError, SafeSetResult};
use crate::mask::SafeSetMask;

/// Slack absorbed when `(x_max − x_min) / τ` lands a hair above an integer.
const COUNT_SLACK: f64 = 1e-9;

/// Largest grid `Grid::new` accepts (10⁸ points).
pub const MAX_GRID_POINTS: usize = 100_000_000;

/// Immutable, strictly increasing grid with constant spacing τ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    x_min: f64,
    tau: f64,
    points: Vec<f64>,
}

/// Build the grid covering [x_min, x_max) with spacing `tau`.
pub fn build_grid(x_min: f64, x_max: f64, tau: f64) -> SafeSetResult<Grid> {
    Grid::new(x_min, x_max, tau)
}

impl Grid {
    pub fn new(x_min: f64, x_max: f64, tau: f64) -> SafeSetResult<Self> {
        if !x_min.is_finite() || !x_max.is_finite() {
            return Err(SafeSetError::Configuration(format!(
                "grid bounds must be finite, got [{x_min}, {x_max})"
            )));
        }
        if !(tau.is_finite() && tau > 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "grid spacing tau must be > 0, got {tau}"
            )));
        }
        if x_max <= x_min {
            return Err(SafeSetError::Configuration(format!(
                "grid requires x_max > x_min, got [{x_min}, {x_max})"
            )));
        }

        let span = (x_max - x_min) / tau;
        if !(span.is_finite() && span - COUNT_SLACK <= MAX_GRID_POINTS as f64) {
            return Err(SafeSetError::Configuration(format!(
                "grid [{x_min}, {x_max}) at tau = {tau} needs {span:.3e} points, \
                 above the limit of {MAX_GRID_POINTS}"
            )));
        }
        let n = (span - COUNT_SLACK).ceil() as usize;
        if n < 2 {
            return Err(SafeSetError::Configuration(format!(
                "grid must contain at least 2 points, got {n} (span {span:.3} steps)"
            )));
        }

        let points = (0..n).map(|i| x_min + i as f64 * tau).collect();
        Ok(Self { x_min, tau, points })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: construction rejects grids with fewer than 2 points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Largest grid point (not the exclusive upper bound).
    pub fn x_last(&self) -> f64 {
        self.points[self.points.len() - 1]
    }

    pub fn point(&self, index: usize) -> Option<f64> {
        self.points.get(index).copied()
    }

    /// Index of the grid point nearest to `x`, clamped to the grid.
    pub fn nearest_index(&self, x: f64) -> usize {
        if !x.is_finite() || x <= self.x_min {
            return 0;
        }
        let idx = ((x - self.x_min) / self.tau).round() as usize;
        idx.min(self.points.len() - 1)
    }

    /// Mask of grid points inside the closed interval [lo, hi].
    pub fn interval_mask(&self, lo: f64, hi: f64) -> SafeSetMask {
        SafeSetMask::from_vec(self.points.iter().map(|&x| x >= lo && x <= hi).collect())
    }

    /// Mask of grid points with |x − center| strictly below `radius`.
    pub fn ball_mask(&self, center: f64, radius: f64) -> SafeSetMask {
        SafeSetMask::from_vec(
            self.points
                .iter()
                .map(|&x| (x - center).abs() < radius)
                .collect(),
        )
    }
}
