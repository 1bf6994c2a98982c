// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Dynamics Model Interface & Adapter
// ─────────────────────────────────────────────────────────────────────
//! Probabilistic dynamics model trait and the adapter the certifier
//! talks to.
//!
//! Any calibrated regressor (Gaussian process, Bayesian linear model,
//! ensemble) can sit behind `DynamicsModel`. The adapter owns the
//! observation set, caches the posterior on the session grid, and drops
//! that cache whenever an observation is committed.

use std::sync::Arc;

use parking_lot::Mutex;

use safeset_types::{DynamicsPosterior, Grid, ObservationSet, SafeSetError, SafeSetResult};

/// Trait for probabilistic dynamics models.
///
/// `predict` returns posterior mean and variance of f at each point.
/// `update` conditions the model on one (state, noisy value) pair; on
/// error the model must be left as it was before the call.
pub trait DynamicsModel: Send {
    fn predict(&self, points: &[f64]) -> SafeSetResult<(Vec<f64>, Vec<f64>)>;
    fn update(&mut self, state: f64, value: f64) -> SafeSetResult<()>;
}

type PredictFn = Box<dyn Fn(&[f64]) -> SafeSetResult<(Vec<f64>, Vec<f64>)> + Send>;
type UpdateFn = Box<dyn FnMut(f64, f64) -> SafeSetResult<()> + Send>;

/// Model backed by caller-supplied closures.
///
/// Used to plug in a regressor that lives elsewhere, and for fixed
/// analytic posteriors in tests.
pub struct ExternalModel {
    predict_fn: PredictFn,
    update_fn: UpdateFn,
}

impl ExternalModel {
    pub fn new(
        predict_fn: impl Fn(&[f64]) -> SafeSetResult<(Vec<f64>, Vec<f64>)> + Send + 'static,
        update_fn: impl FnMut(f64, f64) -> SafeSetResult<()> + Send + 'static,
    ) -> Self {
        Self {
            predict_fn: Box::new(predict_fn),
            update_fn: Box::new(update_fn),
        }
    }

    /// Posterior given pointwise by `mean(x)` and `variance(x)`; updates
    /// are accepted and ignored.
    pub fn analytic(
        mean: impl Fn(f64) -> f64 + Send + 'static,
        variance: impl Fn(f64) -> f64 + Send + 'static,
    ) -> Self {
        Self::new(
            move |pts: &[f64]| {
                Ok((
                    pts.iter().map(|&x| mean(x)).collect(),
                    pts.iter().map(|&x| variance(x)).collect(),
                ))
            },
            |_, _| Ok(()),
        )
    }
}

impl DynamicsModel for ExternalModel {
    fn predict(&self, points: &[f64]) -> SafeSetResult<(Vec<f64>, Vec<f64>)> {
        (self.predict_fn)(points)
    }

    fn update(&mut self, state: f64, value: f64) -> SafeSetResult<()> {
        (self.update_fn)(state, value)
    }
}

/// Identity of a grid for cache lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridKey {
    x_min: u64,
    tau: u64,
    len: usize,
}

impl GridKey {
    fn of(grid: &Grid) -> Self {
        Self {
            x_min: grid.x_min().to_bits(),
            tau: grid.tau().to_bits(),
            len: grid.len(),
        }
    }
}

struct CachedPosterior {
    key: GridKey,
    posterior: Arc<DynamicsPosterior>,
}

/// Adapter between a `DynamicsModel` and the safe-set pipeline.
///
/// The observation set is append-only and grows only through
/// `add_observation`, which takes `&mut self`: no posterior can be read
/// while an update is in flight.
pub struct DynamicsModelAdapter {
    model: Box<dyn DynamicsModel>,
    observations: ObservationSet,
    cache: Mutex<Option<CachedPosterior>>,
}

impl DynamicsModelAdapter {
    pub fn new(model: Box<dyn DynamicsModel>) -> Self {
        Self {
            model,
            observations: ObservationSet::new(),
            cache: Mutex::new(None),
        }
    }

    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }

    /// Posterior mean and variance of the dynamics on `grid`.
    ///
    /// Served from cache until the next committed observation.
    pub fn predict(&self, grid: &Grid) -> SafeSetResult<Arc<DynamicsPosterior>> {
        let key = GridKey::of(grid);
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref() {
            if cached.key == key {
                return Ok(Arc::clone(&cached.posterior));
            }
        }

        let (mean, variance) = self.model.predict(grid.points())?;
        if mean.len() != grid.len() || variance.len() != grid.len() {
            return Err(SafeSetError::ModelUnavailable(format!(
                "model returned {} means and {} variances for {} grid points",
                mean.len(),
                variance.len(),
                grid.len()
            )));
        }
        let posterior = Arc::new(DynamicsPosterior::new(mean, variance)?);
        *cache = Some(CachedPosterior {
            key,
            posterior: Arc::clone(&posterior),
        });
        Ok(posterior)
    }

    /// Condition the model on a new observation and record it.
    ///
    /// The observation is appended only after the model accepts it, so a
    /// failed update leaves both the model and the observation set as
    /// they were.
    pub fn add_observation(&mut self, state: f64, value: f64) -> SafeSetResult<()> {
        if !(state.is_finite() && value.is_finite()) {
            return Err(SafeSetError::Configuration(format!(
                "observation must be finite, got ({state}, {value})"
            )));
        }
        self.model.update(state, value)?;
        self.observations.push(state, value);
        *self.cache.get_mut() = None;
        log::debug!(
            "observation #{} committed: x={state:.5}, f={value:.5}",
            self.observations.len()
        );
        Ok(())
    }

    /// True if a posterior is cached (for any grid).
    pub fn has_cached_posterior(&self) -> bool {
        self.cache.lock().is_some()
    }
}
