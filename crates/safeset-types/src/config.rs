// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Safe-Set Session Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{SafeSetError, SafeSetResult};
use crate::grid::{build_grid, Grid};
use crate::mask::SafeSetMask;

/// Closed interval [lo, hi] of states trusted as safe before any data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedRegion {
    pub lo: f64,
    pub hi: f64,
}

/// Lipschitz inputs for the discretization correction.
///
/// Certification uses `vdot` when set. Otherwise, with `kernel` set, L_f
/// is the high-probability bound of the GP kernel (see `GpConfig`);
/// without it L_f is `dynamics`. Either L_f is combined with
/// `dynamics_magnitude` by the product rule. `sample_path` is the
/// constant of one drawn dynamics function: it is reported for analysis
/// and never used to certify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipschitzConfig {
    /// Explicit Lipschitz constant of V̇ (e.g. a kernel-derived
    /// high-probability bound).
    #[serde(default)]
    pub vdot: Option<f64>,
    /// Derive L_f from the GP kernel hyperparameters and β.
    #[serde(default)]
    pub kernel: bool,
    /// Lipschitz constant of the dynamics f.
    #[serde(default)]
    pub dynamics: Option<f64>,
    /// Bound on |f(x)| over the domain.
    #[serde(default)]
    pub dynamics_magnitude: Option<f64>,
    /// Lipschitz constant of a single sampled dynamics function.
    #[serde(default)]
    pub sample_path: Option<f64>,
}

impl Default for LipschitzConfig {
    fn default() -> Self {
        Self {
            vdot: None,
            kernel: false,
            dynamics: Some(0.25),
            dynamics_magnitude: Some(0.25),
            sample_path: None,
        }
    }
}

/// Hyperparameters for the reference Gaussian-process dynamics model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpConfig {
    /// RBF length scale.
    pub length_scale: f64,
    /// Prior signal variance k(x, x).
    pub signal_variance: f64,
    /// Observation noise variance added to the kernel diagonal.
    pub noise_variance: f64,
    /// Slope a of the prior mean function m(x) = a·x.
    #[serde(default)]
    pub prior_mean_slope: f64,
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            length_scale: 0.2,
            signal_variance: 0.04,
            noise_variance: 1e-4,
            prior_mean_slope: 0.0,
        }
    }
}

/// Full parameter set for one safe-learning session.
///
/// Every quantity the certification depends on is explicit here; nothing
/// is read from globals or the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeSetConfig {
    /// Lower grid bound (inclusive).
    /// Default: -1.0.
    pub x_min: f64,

    /// Upper grid bound (exclusive).
    /// Default: 1.0.
    pub x_max: f64,

    /// Grid spacing τ.
    /// Default: 0.001.
    pub tau: f64,

    /// Coefficient p of the Lyapunov function V(x) = p·x².
    /// Default: 1.0.
    pub lyapunov_p: f64,

    /// Confidence multiplier β on the posterior standard deviation.
    /// Default: 2.0.
    pub beta: f64,

    /// Numeric accuracy ε of the level-set bisection.
    /// Default: 1e-4.
    pub accuracy: f64,

    /// Seed-safe region S0. `None` starts from the Lyapunov minimum.
    /// Default: [-0.2, 0.2].
    #[serde(default)]
    pub seed: Option<SeedRegion>,

    #[serde(default)]
    pub lipschitz: LipschitzConfig,

    #[serde(default)]
    pub gp: GpConfig,

    /// Standard deviation of the oracle's observation noise.
    /// Default: 0.01.
    pub noise_std: f64,

    /// Hard cap on online-loop iterations.
    /// Default: 50.
    pub max_iterations: u64,

    /// Stop after this many consecutive iterations without the level
    /// growing by more than `accuracy`.
    /// Default: 5.
    pub patience: u64,

    /// RNG seed for the noisy oracle.
    /// Default: 42.
    pub rng_seed: u64,
}

impl Default for SafeSetConfig {
    fn default() -> Self {
        Self {
            x_min: -1.0,
            x_max: 1.0,
            tau: 0.001,
            lyapunov_p: 1.0,
            beta: 2.0,
            accuracy: 1e-4,
            seed: Some(SeedRegion { lo: -0.2, hi: 0.2 }),
            lipschitz: LipschitzConfig::default(),
            gp: GpConfig::default(),
            noise_std: 0.01,
            max_iterations: 50,
            patience: 5,
            rng_seed: 42,
        }
    }
}

fn positive(name: &str, value: f64) -> SafeSetResult<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "{name} must be > 0, got {value}"
        )));
    }
    Ok(())
}

fn non_negative(name: &str, value: f64) -> SafeSetResult<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "{name} must be >= 0, got {value}"
        )));
    }
    Ok(())
}

impl SafeSetConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> SafeSetResult<()> {
        if !(self.x_min.is_finite() && self.x_max.is_finite()) || self.x_max <= self.x_min {
            return Err(SafeSetError::Configuration(format!(
                "grid bounds must satisfy x_min < x_max, got [{}, {})",
                self.x_min, self.x_max
            )));
        }
        positive("tau", self.tau)?;
        positive("lyapunov_p", self.lyapunov_p)?;
        non_negative("beta", self.beta)?;
        positive("accuracy", self.accuracy)?;
        non_negative("noise_std", self.noise_std)?;

        if let Some(seed) = self.seed {
            if !(seed.lo.is_finite() && seed.hi.is_finite()) || seed.hi < seed.lo {
                return Err(SafeSetError::Configuration(format!(
                    "seed region must satisfy lo <= hi, got [{}, {}]",
                    seed.lo, seed.hi
                )));
            }
            // Sublevel sets of V all contain its minimum; a seed without it
            // can never be certified.
            let grid = self.grid()?;
            let origin = grid.points()[grid.nearest_index(0.0)];
            if origin < seed.lo || origin > seed.hi {
                return Err(SafeSetError::Configuration(format!(
                    "seed region [{}, {}] must contain the Lyapunov minimum at x = {origin}",
                    seed.lo, seed.hi
                )));
            }
        }

        let lip = &self.lipschitz;
        match (lip.vdot, lip.kernel, lip.dynamics, lip.dynamics_magnitude) {
            (Some(l), _, _, _) => positive("lipschitz.vdot", l)?,
            (None, true, _, Some(fmax)) => {
                non_negative("lipschitz.dynamics_magnitude", fmax)?;
            }
            (None, false, Some(lf), Some(fmax)) => {
                positive("lipschitz.dynamics", lf)?;
                non_negative("lipschitz.dynamics_magnitude", fmax)?;
            }
            _ => {
                return Err(SafeSetError::Configuration(
                    "lipschitz needs vdot, or dynamics_magnitude with kernel or dynamics"
                        .to_string(),
                ))
            }
        }
        if let Some(l) = lip.sample_path {
            non_negative("lipschitz.sample_path", l)?;
        }

        positive("gp.length_scale", self.gp.length_scale)?;
        positive("gp.signal_variance", self.gp.signal_variance)?;
        non_negative("gp.noise_variance", self.gp.noise_variance)?;
        if !self.gp.prior_mean_slope.is_finite() {
            return Err(SafeSetError::Configuration(format!(
                "gp.prior_mean_slope must be finite, got {}",
                self.gp.prior_mean_slope
            )));
        }

        if self.max_iterations == 0 {
            return Err(SafeSetError::Configuration(
                "max_iterations must be > 0".to_string(),
            ));
        }
        if self.patience == 0 {
            return Err(SafeSetError::Configuration(
                "patience must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from JSON string and validate.
    pub fn from_json(json: &str) -> SafeSetResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| SafeSetError::Configuration(format!("JSON parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Session grid [x_min, x_max) with spacing τ.
    pub fn grid(&self) -> SafeSetResult<Grid> {
        build_grid(self.x_min, self.x_max, self.tau)
    }

    /// S0 on `grid`; `None` when no seed region is configured.
    pub fn seed_mask(&self, grid: &Grid) -> Option<SafeSetMask> {
        self.seed.map(|s| grid.interval_mask(s.lo, s.hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SafeSetConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_non_positive_tau() {
        let cfg = SafeSetConfig {
            tau: 0.0,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("tau"), "{err}");
    }

    #[test]
    fn test_rejects_negative_beta() {
        let cfg = SafeSetConfig {
            beta: -1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_indefinite_lyapunov() {
        let cfg = SafeSetConfig {
            lyapunov_p: -0.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_missing_lipschitz() {
        let cfg = SafeSetConfig {
            lipschitz: LipschitzConfig {
                vdot: None,
                kernel: false,
                dynamics: Some(0.5),
                dynamics_magnitude: None,
                sample_path: None,
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_lipschitz() {
        let cfg = SafeSetConfig {
            lipschitz: LipschitzConfig {
                vdot: Some(0.0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_seed_without_lyapunov_minimum() {
        let cfg = SafeSetConfig {
            seed: Some(SeedRegion { lo: 0.3, hi: 0.6 }),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SafeSetError::Configuration(_))
        ));

        // Grid away from the origin: the minimum is the left endpoint.
        let shifted = SafeSetConfig {
            x_min: 0.5,
            x_max: 1.5,
            tau: 0.01,
            seed: Some(SeedRegion { lo: 0.5, hi: 0.7 }),
            ..Default::default()
        };
        shifted.validate().unwrap();
    }

    #[test]
    fn test_kernel_lipschitz_needs_magnitude() {
        let kernel = |fmax| SafeSetConfig {
            lipschitz: LipschitzConfig {
                kernel: true,
                dynamics: None,
                dynamics_magnitude: fmax,
                ..Default::default()
            },
            ..Default::default()
        };
        kernel(Some(0.3)).validate().unwrap();
        assert!(kernel(None).validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_seed() {
        let cfg = SafeSetConfig {
            seed: Some(SeedRegion { lo: 0.3, hi: -0.3 }),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let json = r#"{
            "x_min": -2.0, "x_max": 2.0, "tau": 0.01,
            "lyapunov_p": 0.5, "beta": 3.0, "accuracy": 0.001,
            "lipschitz": { "vdot": 1.5, "sample_path": 0.9 },
            "noise_std": 0.0, "max_iterations": 10, "patience": 3, "rng_seed": 7
        }"#;
        let cfg = SafeSetConfig::from_json(json).unwrap();
        assert_eq!(cfg.lipschitz.vdot, Some(1.5));
        assert_eq!(cfg.lipschitz.sample_path, Some(0.9));
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.gp, GpConfig::default());
    }

    #[test]
    fn test_grid_and_seed_builders() {
        let cfg = SafeSetConfig {
            tau: 0.1,
            ..Default::default()
        };
        let grid = cfg.grid().unwrap();
        assert_eq!(grid.len(), 20);
        let seed = cfg.seed_mask(&grid).unwrap();
        assert!(seed.contains(grid.nearest_index(0.0)));
        assert!(!seed.contains(0));

        let no_seed = SafeSetConfig {
            seed: None,
            ..cfg
        };
        assert!(no_seed.seed_mask(&grid).is_none());
    }

    #[test]
    fn test_from_json_invalid() {
        let err = SafeSetConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SafeSetError::Configuration(_)));
    }
}
