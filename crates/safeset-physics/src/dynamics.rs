// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — True-Dynamics Oracles
// ─────────────────────────────────────────────────────────────────────
//! The real system behind the model: queried only by the active sampler,
//! and only at states already certified safe.
//!
//! `SyntheticDynamics` is a closed-form test system
//!
//!   f(x) = a·x + b·sin(ω·x)
//!
//! with exact derivative, Lipschitz constant |a| + |b|·ω and magnitude
//! bound |a|·max|x| + |b|. `NoisyOracle` adds seeded Gaussian
//! observation noise to any dynamics function.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use safeset_types::{SafeSetError, SafeSetResult};

/// Source of (noisy) dynamics observations.
///
/// An implementation backed by a remote system must not return until the
/// observation is final: the caller commits it to the model immediately.
pub trait DynamicsOracle {
    fn observe(&mut self, state: f64) -> SafeSetResult<f64>;
}

/// f(x) = a·x + b·sin(ω·x).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDynamics {
    pub slope: f64,
    pub amplitude: f64,
    pub frequency: f64,
}

impl SyntheticDynamics {
    /// Pure linear dynamics f(x) = a·x.
    pub fn linear(slope: f64) -> Self {
        Self {
            slope,
            amplitude: 0.0,
            frequency: 0.0,
        }
    }

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.amplitude * (self.frequency * x).sin()
    }

    #[inline]
    pub fn derivative(&self, x: f64) -> f64 {
        self.slope + self.amplitude * self.frequency * (self.frequency * x).cos()
    }

    /// Global Lipschitz constant |a| + |b|·|ω|.
    pub fn lipschitz(&self) -> f64 {
        self.slope.abs() + self.amplitude.abs() * self.frequency.abs()
    }

    /// Bound on |f| over [-radius, radius].
    pub fn magnitude_bound(&self, radius: f64) -> f64 {
        self.slope.abs() * radius.abs() + self.amplitude.abs()
    }
}

/// Dynamics plus i.i.d. Gaussian noise N(0, σ²), seeded.
pub struct NoisyOracle<F> {
    dynamics: F,
    noise_std: f64,
    rng: StdRng,
    queries: u64,
}

impl<F> NoisyOracle<F>
where
    F: Fn(f64) -> f64,
{
    pub fn new(dynamics: F, noise_std: f64, seed: u64) -> SafeSetResult<Self> {
        if !(noise_std.is_finite() && noise_std >= 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "noise_std must be >= 0, got {noise_std}"
            )));
        }
        Ok(Self {
            dynamics,
            noise_std,
            rng: StdRng::seed_from_u64(seed),
            queries: 0,
        })
    }

    /// Noise-free value f(x).
    pub fn true_value(&self, state: f64) -> f64 {
        (self.dynamics)(state)
    }

    pub fn queries(&self) -> u64 {
        self.queries
    }

    /// Standard normal via Box-Muller.
    fn next_normal(&mut self) -> f64 {
        let u1: f64 = self.rng.random::<f64>().max(1e-300);
        let u2: f64 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

impl<F> DynamicsOracle for NoisyOracle<F>
where
    F: Fn(f64) -> f64,
{
    fn observe(&mut self, state: f64) -> SafeSetResult<f64> {
        if !state.is_finite() {
            return Err(SafeSetError::Oracle(format!(
                "cannot query non-finite state {state}"
            )));
        }
        let noise = if self.noise_std > 0.0 {
            self.noise_std * self.next_normal()
        } else {
            0.0
        };
        let value = self.true_value(state) + noise;
        if !value.is_finite() {
            return Err(SafeSetError::Oracle(format!(
                "dynamics returned non-finite value at x = {state}"
            )));
        }
        self.queries += 1;
        Ok(value)
    }
}
