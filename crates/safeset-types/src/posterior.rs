// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Dynamics Posterior & Observation Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_len, SafeSetError, SafeSetResult};

/// A single (state, noisy dynamics value) pair from the true system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub state: f64,
    pub value: f64,
}

/// Append-only record of every observation fed to the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    observations: Vec<Observation>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: f64, value: f64) {
        self.observations.push(Observation { state, value });
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn as_slice(&self) -> &[Observation] {
        &self.observations
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

/// Posterior mean and variance of the dynamics at every grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsPosterior {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

impl DynamicsPosterior {
    /// Validate a raw model prediction.
    ///
    /// Non-finite entries mean the model failed; slightly negative
    /// variances (round-off in the posterior solve) are clamped to 0.
    pub fn new(mean: Vec<f64>, mut variance: Vec<f64>) -> SafeSetResult<Self> {
        ensure_same_len("posterior variance", mean.len(), variance.len())?;
        if let Some(i) = mean.iter().position(|m| !m.is_finite()) {
            return Err(SafeSetError::ModelUnavailable(format!(
                "posterior mean is non-finite at index {i}"
            )));
        }
        if let Some(i) = variance.iter().position(|v| !v.is_finite()) {
            return Err(SafeSetError::ModelUnavailable(format!(
                "posterior variance is non-finite at index {i}"
            )));
        }
        let mut clamped = 0usize;
        for v in variance.iter_mut() {
            if *v < 0.0 {
                *v = 0.0;
                clamped += 1;
            }
        }
        if clamped > 0 {
            log::warn!("DynamicsPosterior: clamped {clamped} negative variances to 0");
        }
        Ok(Self { mean, variance })
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}
