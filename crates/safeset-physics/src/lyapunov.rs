// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Quadratic Lyapunov Oracle
// ─────────────────────────────────────────────────────────────────────
//! Scalar quadratic Lyapunov function.
//!
//! V(x) = p·x²,  dV/dx = 2p·x,  p > 0.
//!
//! Along ẋ = f(x) the time derivative is V̇(x) = dV/dx · f(x); the
//! system is decreasing in V wherever V̇ < 0.

use serde::{Deserialize, Serialize};

use safeset_types::{Grid, SafeSetError, SafeSetResult};

/// V and dV/dx sampled on a grid. Immutable for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyapunovValues {
    /// V(x_i) ≥ 0.
    pub v: Vec<f64>,
    /// dV/dx at x_i.
    pub dv: Vec<f64>,
}

impl LyapunovValues {
    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }

    /// Index of the minimum V (lowest index on ties).
    pub fn argmin(&self) -> Option<usize> {
        self.v
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &vi)| match best {
                Some((_, b)) if b <= vi => best,
                _ => Some((i, vi)),
            })
            .map(|(i, _)| i)
    }

    pub fn max_v(&self) -> f64 {
        self.v.iter().copied().fold(0.0, f64::max)
    }

    /// max |dV/dx| over the grid.
    pub fn max_abs_dv(&self) -> f64 {
        self.dv.iter().map(|d| d.abs()).fold(0.0, f64::max)
    }
}

/// V(x) = p·x².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticLyapunov {
    p: f64,
}

impl QuadraticLyapunov {
    /// Reject indefinite or degenerate forms: p must be finite and > 0.
    pub fn new(p: f64) -> SafeSetResult<Self> {
        if !(p.is_finite() && p > 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "quadratic form must be positive definite, got p = {p}"
            )));
        }
        Ok(Self { p })
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    #[inline]
    pub fn value(&self, x: f64) -> f64 {
        self.p * x * x
    }

    #[inline]
    pub fn derivative(&self, x: f64) -> f64 {
        2.0 * self.p * x
    }

    /// Lipschitz constant of dV/dx (constant for a quadratic).
    pub fn derivative_lipschitz(&self) -> f64 {
        2.0 * self.p
    }

    /// V̇(x) = dV/dx · f(x) for a known dynamics value `fx`.
    #[inline]
    pub fn v_dot(&self, x: f64, fx: f64) -> f64 {
        self.derivative(x) * fx
    }

    pub fn evaluate(&self, grid: &Grid) -> LyapunovValues {
        let pts = grid.points();
        LyapunovValues {
            v: pts.iter().map(|&x| self.value(x)).collect(),
            dv: pts.iter().map(|&x| self.derivative(x)).collect(),
        }
    }
}

/// Evaluate V(x) = p·x² and its derivative on every grid point.
pub fn lyapunov(grid: &Grid, p: f64) -> SafeSetResult<LyapunovValues> {
    Ok(QuadraticLyapunov::new(p)?.evaluate(grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeset_types::build_grid;

    #[test]
    fn test_values_non_negative() {
        let grid = build_grid(-1.0, 1.0, 0.01).unwrap();
        let lv = lyapunov(&grid, 0.7).unwrap();
        assert_eq!(lv.len(), grid.len());
        assert!(lv.v.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let lyap = QuadraticLyapunov::new(1.3).unwrap();
        let h = 1e-6;
        for &x in &[-0.8, -0.1, 0.0, 0.4, 0.95] {
            let fd = (lyap.value(x + h) - lyap.value(x - h)) / (2.0 * h);
            assert!((fd - lyap.derivative(x)).abs() < 1e-6, "x={x}: fd={fd}");
        }
    }

    #[test]
    fn test_rejects_indefinite_form() {
        assert!(matches!(
            QuadraticLyapunov::new(-1.0),
            Err(SafeSetError::Configuration(_))
        ));
        assert!(QuadraticLyapunov::new(0.0).is_err());
        assert!(lyapunov(&build_grid(0.0, 1.0, 0.1).unwrap(), f64::NAN).is_err());
    }

    #[test]
    fn test_argmin_at_origin() {
        let grid = build_grid(-1.0, 1.0, 0.5).unwrap();
        let lv = lyapunov(&grid, 1.0).unwrap();
        assert_eq!(lv.argmin(), Some(2));
        assert!((lv.max_v() - 1.0).abs() < 1e-12);
        assert!((lv.max_abs_dv() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_argmin_tie_lowest_index() {
        let lv = LyapunovValues {
            v: vec![0.5, 0.1, 0.1, 0.3],
            dv: vec![0.0; 4],
        };
        assert_eq!(lv.argmin(), Some(1));
    }

    #[test]
    fn test_v_dot_sign() {
        let lyap = QuadraticLyapunov::new(1.0).unwrap();
        // Stable linear dynamics f(x) = -x → V̇ = -2x² < 0.
        assert!(lyap.v_dot(0.5, -0.5) < 0.0);
        assert!(lyap.v_dot(-0.5, 0.5) < 0.0);
    }
}
