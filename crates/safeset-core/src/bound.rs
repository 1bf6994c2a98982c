// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — V̇ Upper Confidence Bound
// ─────────────────────────────────────────────────────────────────────
//! Pointwise bound on V̇(x) = dV/dx · f(x) under the dynamics posterior:
//!
//!   U_i = dV_i · μ_i + β · |dV_i| · σ_i
//!
//! With f(x_i) ∈ [μ_i − βσ_i, μ_i + βσ_i], U_i is the worst case of V̇.

use safeset_types::{ensure_same_len, SafeSetError, SafeSetResult};

/// Upper confidence bound U on V̇ at every grid point.
///
/// Negative variance entries are treated as zero.
pub fn compute_v_dot_bound(
    dv: &[f64],
    mean: &[f64],
    variance: &[f64],
    beta: f64,
) -> SafeSetResult<Vec<f64>> {
    ensure_same_len("posterior mean", dv.len(), mean.len())?;
    ensure_same_len("posterior variance", dv.len(), variance.len())?;
    if !(beta.is_finite() && beta >= 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "beta must be >= 0, got {beta}"
        )));
    }

    Ok(dv
        .iter()
        .zip(mean)
        .zip(variance)
        .map(|((&d, &m), &var)| d * m + beta * d.abs() * var.max(0.0).sqrt())
        .collect())
}

/// Mean and variance of V̇ under the posterior:
/// (dV_i · μ_i, dV_i² · σ_i²).
pub fn compute_v_dot_distribution(
    dv: &[f64],
    mean: &[f64],
    variance: &[f64],
) -> SafeSetResult<(Vec<f64>, Vec<f64>)> {
    ensure_same_len("posterior mean", dv.len(), mean.len())?;
    ensure_same_len("posterior variance", dv.len(), variance.len())?;

    let v_dot_mean = dv.iter().zip(mean).map(|(&d, &m)| d * m).collect();
    let v_dot_var = dv
        .iter()
        .zip(variance)
        .map(|(&d, &var)| d * d * var.max(0.0))
        .collect();
    Ok((v_dot_mean, v_dot_var))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_without_uncertainty_is_mean() {
        let dv = [-2.0, 0.0, 1.0];
        let mean = [0.5, 3.0, -0.25];
        let u = compute_v_dot_bound(&dv, &mean, &[0.0; 3], 2.0).unwrap();
        assert_eq!(u, vec![-1.0, 0.0, -0.25]);
    }

    #[test]
    fn test_bound_inflates_by_abs_dv() {
        // Sign of dV must not flip the inflation.
        let u = compute_v_dot_bound(&[-2.0, 2.0], &[0.0, 0.0], &[0.04, 0.04], 1.5).unwrap();
        assert!((u[0] - 0.6).abs() < 1e-12);
        assert!((u[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_bound_is_upper_of_distribution() {
        let dv = [-1.2, 0.3, 0.9];
        let mean = [0.1, -0.4, 0.2];
        let var = [0.01, 0.09, 0.0];
        let u = compute_v_dot_bound(&dv, &mean, &var, 2.0).unwrap();
        let (m, v) = compute_v_dot_distribution(&dv, &mean, &var).unwrap();
        for i in 0..3 {
            assert!((u[i] - (m[i] + 2.0 * v[i].sqrt())).abs() < 1e-12);
        }
    }

    #[test]
    fn test_negative_variance_treated_as_zero() {
        let u = compute_v_dot_bound(&[1.0], &[0.5], &[-1e-12], 3.0).unwrap();
        assert_eq!(u, vec![0.5]);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            compute_v_dot_bound(&[1.0, 2.0], &[0.0], &[0.0, 0.0], 1.0),
            Err(SafeSetError::Configuration(_))
        ));
        assert!(compute_v_dot_distribution(&[1.0], &[0.0], &[]).is_err());
    }

    #[test]
    fn test_rejects_negative_beta() {
        assert!(compute_v_dot_bound(&[1.0], &[0.0], &[0.0], -0.1).is_err());
    }
}
