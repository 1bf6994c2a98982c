// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Lipschitz Bounds for V̇
// ─────────────────────────────────────────────────────────────────────
//! Lipschitz constant L of V̇(x) = dV/dx · f(x) and the discretization
//! threshold T = −L·τ.
//!
//! Between two grid points τ apart, V̇ moves by at most L·τ. A grid point
//! whose V̇ upper bound is ≤ −L·τ therefore certifies V̇ < 0 on the whole
//! cell around it.
//!
//! Two kinds of constant are kept apart:
//!   - certification constants (explicit, product-rule, or kernel-derived
//!     high-probability bounds) feed the threshold;
//!   - sample-path constants, measured on one drawn dynamics function,
//!     are for analysis only.

use serde::{Deserialize, Serialize};

use safeset_types::{GpConfig, SafeSetConfig, SafeSetError, SafeSetResult};

use crate::lyapunov::{LyapunovValues, QuadraticLyapunov};

/// Where a Lipschitz constant came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LipschitzSource {
    /// Supplied directly by the caller.
    Explicit,
    /// max|dV/dx|·L_f + max|f|·L_dV.
    ProductRule,
    /// High-probability bound from the model kernel.
    KernelHighProbability,
    /// Measured on a single sampled dynamics function.
    SamplePath,
}

/// Positive Lipschitz constant with provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LipschitzConstant {
    pub value: f64,
    pub source: LipschitzSource,
}

impl LipschitzConstant {
    pub fn new(value: f64, source: LipschitzSource) -> SafeSetResult<Self> {
        if !(value.is_finite() && value > 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "Lipschitz constant must be > 0, got {value} ({source:?})"
            )));
        }
        Ok(Self { value, source })
    }

    pub fn explicit(value: f64) -> SafeSetResult<Self> {
        Self::new(value, LipschitzSource::Explicit)
    }

    /// Product rule for V̇ = dV·f:
    /// L ≤ max|dV/dx|·L_f + max|f|·L_dV.
    pub fn product_rule(
        dynamics_lipschitz: f64,
        dynamics_magnitude: f64,
        lyapunov: &QuadraticLyapunov,
        values: &LyapunovValues,
    ) -> SafeSetResult<Self> {
        if !(dynamics_lipschitz.is_finite() && dynamics_lipschitz >= 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "dynamics Lipschitz bound must be >= 0, got {dynamics_lipschitz}"
            )));
        }
        if !(dynamics_magnitude.is_finite() && dynamics_magnitude >= 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "dynamics magnitude bound must be >= 0, got {dynamics_magnitude}"
            )));
        }
        let value = values.max_abs_dv() * dynamics_lipschitz
            + dynamics_magnitude * lyapunov.derivative_lipschitz();
        Self::new(value, LipschitzSource::ProductRule)
    }

    /// Product rule with L_f from the RBF kernel of the dynamics model.
    ///
    /// Holds with the same confidence as the β-scaled posterior bound.
    pub fn kernel_high_probability(
        gp: &GpConfig,
        beta: f64,
        dynamics_magnitude: f64,
        lyapunov: &QuadraticLyapunov,
        values: &LyapunovValues,
    ) -> SafeSetResult<Self> {
        let lf = rbf_kernel_dynamics_bound(
            gp.signal_variance,
            gp.length_scale,
            beta,
            gp.prior_mean_slope,
        )?;
        let bound = Self::product_rule(lf, dynamics_magnitude, lyapunov, values)?;
        Self::new(bound.value, LipschitzSource::KernelHighProbability)
    }

    /// Discretization threshold T = −L·τ.
    pub fn threshold(&self, tau: f64) -> SafeSetResult<f64> {
        safety_threshold(self.value, tau)
    }
}

/// T = −L·τ; rejects non-positive L or τ.
pub fn safety_threshold(lipschitz: f64, tau: f64) -> SafeSetResult<f64> {
    if !(lipschitz.is_finite() && lipschitz > 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "Lipschitz constant must be > 0, got {lipschitz}"
        )));
    }
    if !(tau.is_finite() && tau > 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "grid spacing tau must be > 0, got {tau}"
        )));
    }
    Ok(-lipschitz * tau)
}

/// High-probability Lipschitz bound of f under an RBF-kernel GP prior.
///
/// The derivative of a GP sample with kernel σ²·exp(−r²/2ℓ²) has
/// standard deviation σ/ℓ, so |f'| ≤ |a| + β·σ/ℓ with the same confidence
/// as the β-scaled posterior bound, where a is the prior mean slope.
pub fn rbf_kernel_dynamics_bound(
    signal_variance: f64,
    length_scale: f64,
    beta: f64,
    prior_mean_slope: f64,
) -> SafeSetResult<f64> {
    if !(signal_variance.is_finite() && signal_variance > 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "signal_variance must be > 0, got {signal_variance}"
        )));
    }
    if !(length_scale.is_finite() && length_scale > 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "length_scale must be > 0, got {length_scale}"
        )));
    }
    if !(beta.is_finite() && beta >= 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "beta must be >= 0, got {beta}"
        )));
    }
    Ok(prior_mean_slope.abs() + beta * signal_variance.sqrt() / length_scale)
}

/// Largest finite-difference slope of `values` sampled at `points`.
///
/// This is a lower estimate of the true constant of that one function.
pub fn estimate_sample_path(points: &[f64], values: &[f64]) -> SafeSetResult<LipschitzConstant> {
    safeset_types::ensure_same_len("sample path values", points.len(), values.len())?;
    let slope = points
        .windows(2)
        .zip(values.windows(2))
        .filter(|(x, _)| x[1] != x[0])
        .map(|(x, y)| ((y[1] - y[0]) / (x[1] - x[0])).abs())
        .fold(0.0, f64::max);
    if slope == 0.0 {
        return Err(SafeSetError::Configuration(
            "sample path is constant; no Lipschitz estimate".to_string(),
        ));
    }
    LipschitzConstant::new(slope, LipschitzSource::SamplePath)
}

/// Lipschitz constants for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionLipschitz {
    /// Used for T = −L·τ.
    pub certification: LipschitzConstant,
    /// Reported alongside, never used to certify.
    pub sample_path: Option<LipschitzConstant>,
}

impl SessionLipschitz {
    /// Resolve the session constants: explicit `vdot`, then the kernel
    /// bound, then the product rule on raw dynamics bounds.
    pub fn from_config(
        cfg: &SafeSetConfig,
        lyapunov: &QuadraticLyapunov,
        values: &LyapunovValues,
    ) -> SafeSetResult<Self> {
        let lip = &cfg.lipschitz;
        let certification = match (lip.vdot, lip.kernel, lip.dynamics, lip.dynamics_magnitude) {
            (Some(l), _, _, _) => LipschitzConstant::explicit(l)?,
            (None, true, _, Some(fmax)) => LipschitzConstant::kernel_high_probability(
                &cfg.gp, cfg.beta, fmax, lyapunov, values,
            )?,
            (None, false, Some(lf), Some(fmax)) => {
                LipschitzConstant::product_rule(lf, fmax, lyapunov, values)?
            }
            _ => {
                return Err(SafeSetError::Configuration(
                    "lipschitz needs vdot, or dynamics_magnitude with kernel or dynamics"
                        .to_string(),
                ))
            }
        };
        let sample_path = lip
            .sample_path
            .filter(|&l| l > 0.0)
            .map(|l| LipschitzConstant::new(l, LipschitzSource::SamplePath))
            .transpose()?;

        let session = Self {
            certification,
            sample_path,
        };
        session.check_sample_path();
        Ok(session)
    }

    /// Attach the sample-path constant measured on V̇ of one dynamics
    /// function evaluated at `points`.
    pub fn measure_sample_path(mut self, points: &[f64], v_dot: &[f64]) -> SafeSetResult<Self> {
        self.sample_path = Some(estimate_sample_path(points, v_dot)?);
        self.check_sample_path();
        Ok(self)
    }

    fn check_sample_path(&self) {
        if let Some(sp) = self.sample_path {
            if sp.value > self.certification.value {
                log::warn!(
                    "sample-path Lipschitz {:.4} exceeds certification constant {:.4}; \
                     certification bound may be optimistic",
                    sp.value,
                    self.certification.value
                );
            }
        }
    }

    /// Certification threshold T = −L·τ.
    pub fn threshold(&self, tau: f64) -> SafeSetResult<f64> {
        if self.certification.source == LipschitzSource::SamplePath {
            log::warn!("certifying with a sample-path Lipschitz constant");
        }
        self.certification.threshold(tau)
    }
}
