// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Active Sampler & Online Loop
// ─────────────────────────────────────────────────────────────────────
//! One iteration:
//!   1. Posterior of the dynamics on the grid (adapter, cached)
//!   2. V̇ bound → certified region → largest sublevel set {V ≤ c}
//!   3. Most uncertain safe point: argmax posterior variance inside the
//!      sublevel set, lowest index on ties
//!   4. Query the true system there and commit the observation
//!
//! Queries never leave the certified set. An empty safe set is reported
//! as `EmptySafeSet`; no fallback point is ever chosen.
//!
//! The sampler is Idle between iterations and Querying while an
//! observation is outstanding. The observation is committed to the model
//! before the state returns to Idle, so the next certification always
//! sees a complete observation set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use safeset_physics::{
    safety_threshold, DynamicsOracle, LyapunovValues, QuadraticLyapunov, SessionLipschitz,
};
use safeset_types::{
    ensure_same_len, DynamicsPosterior, Grid, LevelSet, RunSummary, SafeSetConfig,
    SafeSetError, SafeSetMask, SafeSetResult, StepReport,
};

use crate::bound::compute_v_dot_bound;
use crate::certifier::certify_safe_set;
use crate::levelset::max_levelset_with_floor;
use crate::model::{DynamicsModel, DynamicsModelAdapter};

/// Parameters of one certification pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CertificationParams {
    /// Certification Lipschitz constant L of V̇.
    pub lipschitz: f64,
    /// Grid spacing τ.
    pub tau: f64,
    /// Confidence multiplier β.
    pub beta: f64,
    /// Level-set accuracy ε.
    pub accuracy: f64,
}

impl CertificationParams {
    /// T = −L·τ.
    pub fn threshold(&self) -> SafeSetResult<f64> {
        safety_threshold(self.lipschitz, self.tau)
    }
}

/// Everything derived from one posterior snapshot.
#[derive(Debug, Clone)]
pub struct Certification {
    pub posterior: Arc<DynamicsPosterior>,
    /// U_i, the V̇ upper bound.
    pub v_dot_bound: Vec<f64>,
    /// Contiguous region from the certifier, before level-set shrinking.
    pub certified: SafeSetMask,
    /// Largest sublevel set inside `certified`.
    pub level_set: LevelSet,
}

/// Run steps 1–2 of an iteration without querying anything.
///
/// `floor` is a level already known to be safe (the previous iteration's
/// c); the returned level never falls below it while it stays feasible.
pub fn certify(
    adapter: &DynamicsModelAdapter,
    grid: &Grid,
    lyapunov: &LyapunovValues,
    params: &CertificationParams,
    seed: Option<&SafeSetMask>,
    floor: Option<f64>,
) -> SafeSetResult<Certification> {
    ensure_same_len("Lyapunov values", grid.len(), lyapunov.len())?;
    let threshold = params.threshold()?;
    let posterior = adapter.predict(grid)?;
    let v_dot_bound =
        compute_v_dot_bound(&lyapunov.dv, &posterior.mean, &posterior.variance, params.beta)?;
    let certified = certify_safe_set(&v_dot_bound, threshold, seed, &lyapunov.v)?;
    let level_set = max_levelset_with_floor(&certified, &lyapunov.v, params.accuracy, floor)?;
    Ok(Certification {
        posterior,
        v_dot_bound,
        certified,
        level_set,
    })
}

/// Index of the largest variance among safe points, lowest index on ties.
pub fn select_most_uncertain(mask: &SafeSetMask, variance: &[f64]) -> SafeSetResult<usize> {
    ensure_same_len("posterior variance", mask.len(), variance.len())?;
    let mut best: Option<(usize, f64)> = None;
    for i in mask.indices() {
        let var = variance[i];
        match best {
            Some((_, b)) if var <= b => {}
            _ => best = Some((i, var)),
        }
    }
    best.map(|(i, _)| i).ok_or_else(|| {
        log::error!("active sampling: safe set is empty, nothing to query");
        SafeSetError::EmptySafeSet("no safe point available for sampling".to_string())
    })
}

/// Sampler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SamplerState {
    /// No query outstanding.
    Idle,
    /// Query dispatched at `index`; its observation is not yet committed.
    Querying { index: usize, state: f64 },
}

/// Steps 3–4: choose, query, commit.
fn query_and_commit(
    adapter: &mut DynamicsModelAdapter,
    oracle: &mut dyn DynamicsOracle,
    grid: &Grid,
    cert: Certification,
    iteration: u64,
    sampler_state: &mut SamplerState,
) -> SafeSetResult<StepReport> {
    let index = select_most_uncertain(&cert.level_set.mask, &cert.posterior.variance)?;
    let state = grid.points()[index];
    let max_safe_variance = cert.posterior.variance[index];

    *sampler_state = SamplerState::Querying { index, state };
    let committed = oracle
        .observe(state)
        .and_then(|value| adapter.add_observation(state, value).map(|_| value));
    *sampler_state = SamplerState::Idle;
    let observed_value = committed?;

    log::debug!(
        "iteration {iteration}: c={:.5e}, {} safe, queried x={state:.5} (var {max_safe_variance:.3e}) → {observed_value:.5}",
        cert.level_set.level,
        cert.level_set.mask.count()
    );

    Ok(StepReport {
        iteration,
        level: cert.level_set.level,
        mask: cert.level_set.mask,
        queried_index: index,
        queried_state: state,
        observed_value,
        max_safe_variance,
    })
}

/// One full iteration: certify, pick the most uncertain safe point, query
/// the oracle there, and commit the observation.
///
/// `iteration` in the report is the number of observations held before
/// this step.
pub fn step(
    adapter: &mut DynamicsModelAdapter,
    oracle: &mut dyn DynamicsOracle,
    grid: &Grid,
    lyapunov: &LyapunovValues,
    params: &CertificationParams,
    seed: Option<&SafeSetMask>,
) -> SafeSetResult<StepReport> {
    let cert = certify(adapter, grid, lyapunov, params, seed, None)?;
    let iteration = adapter.observations().len() as u64;
    let mut sampler_state = SamplerState::Idle;
    query_and_commit(adapter, oracle, grid, cert, iteration, &mut sampler_state)
}

/// When the online loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TerminationPolicy {
    /// Run exactly this many iterations (subject to the hard cap).
    FixedIterations(u64),
    /// Stop once c has not grown by more than `min_growth` for
    /// `patience` consecutive iterations.
    Stagnation { patience: u64, min_growth: f64 },
}

/// Online safe-learning session.
///
/// Each iteration's certified sublevel set joins the seed of the next,
/// so the certified level never decreases while observations accumulate.
pub struct OnlineLoop {
    grid: Grid,
    lyapunov: LyapunovValues,
    adapter: DynamicsModelAdapter,
    oracle: Box<dyn DynamicsOracle>,
    params: CertificationParams,
    seed: Option<SafeSetMask>,
    current: Option<LevelSet>,
    state: SamplerState,
    iteration: u64,
    max_iterations: u64,
}

impl OnlineLoop {
    pub fn new(
        grid: Grid,
        lyapunov: LyapunovValues,
        adapter: DynamicsModelAdapter,
        oracle: Box<dyn DynamicsOracle>,
        params: CertificationParams,
        seed: Option<SafeSetMask>,
        max_iterations: u64,
    ) -> SafeSetResult<Self> {
        ensure_same_len("Lyapunov values", grid.len(), lyapunov.len())?;
        if let Some(s) = &seed {
            ensure_same_len("seed mask", grid.len(), s.len())?;
        }
        params.threshold()?;
        if !(params.beta.is_finite() && params.beta >= 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "beta must be >= 0, got {}",
                params.beta
            )));
        }
        if !(params.accuracy.is_finite() && params.accuracy > 0.0) {
            return Err(SafeSetError::Configuration(format!(
                "accuracy must be > 0, got {}",
                params.accuracy
            )));
        }
        Ok(Self {
            grid,
            lyapunov,
            adapter,
            oracle,
            params,
            seed,
            current: None,
            state: SamplerState::Idle,
            iteration: 0,
            max_iterations: max_iterations.max(1),
        })
    }

    /// Build a session from a validated config.
    pub fn from_config(
        cfg: &SafeSetConfig,
        model: Box<dyn DynamicsModel>,
        oracle: Box<dyn DynamicsOracle>,
    ) -> SafeSetResult<Self> {
        cfg.validate()?;
        let grid = cfg.grid()?;
        let lyap = QuadraticLyapunov::new(cfg.lyapunov_p)?;
        let lyapunov = lyap.evaluate(&grid);
        let lipschitz = SessionLipschitz::from_config(cfg, &lyap, &lyapunov)?;
        let params = CertificationParams {
            lipschitz: lipschitz.certification.value,
            tau: cfg.tau,
            beta: cfg.beta,
            accuracy: cfg.accuracy,
        };
        let seed = cfg.seed_mask(&grid);
        log::info!(
            "safe-set session: {} grid points, L={:.4} ({:?}), T={:.4e}, beta={}",
            grid.len(),
            params.lipschitz,
            lipschitz.certification.source,
            params.threshold()?,
            params.beta
        );
        Self::new(
            grid,
            lyapunov,
            DynamicsModelAdapter::new(model),
            oracle,
            params,
            seed,
            cfg.max_iterations,
        )
    }

    /// Policy implied by a config: stagnation with its patience and ε.
    pub fn default_policy(cfg: &SafeSetConfig) -> TerminationPolicy {
        TerminationPolicy::Stagnation {
            patience: cfg.patience,
            min_growth: cfg.accuracy,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn lyapunov(&self) -> &LyapunovValues {
        &self.lyapunov
    }

    pub fn adapter(&self) -> &DynamicsModelAdapter {
        &self.adapter
    }

    pub fn params(&self) -> &CertificationParams {
        &self.params
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Last certified sublevel set, if any iteration has run.
    pub fn current_level_set(&self) -> Option<&LevelSet> {
        self.current.as_ref()
    }

    /// Seed for the next certification: S0 ∪ previous sublevel set.
    fn effective_seed(&self) -> SafeSetResult<Option<SafeSetMask>> {
        match (&self.seed, &self.current) {
            (Some(s), Some(prev)) => Ok(Some(s.union(&prev.mask)?)),
            (Some(s), None) => Ok(Some(s.clone())),
            (None, Some(prev)) => Ok(Some(prev.mask.clone())),
            (None, None) => Ok(None),
        }
    }

    /// Certify under the current observations without querying.
    pub fn certify(&self) -> SafeSetResult<Certification> {
        let seed = self.effective_seed()?;
        certify(
            &self.adapter,
            &self.grid,
            &self.lyapunov,
            &self.params,
            seed.as_ref(),
            self.current.as_ref().map(|ls| ls.level),
        )
    }

    /// Run one iteration.
    pub fn step(&mut self) -> SafeSetResult<StepReport> {
        let cert = self.certify()?;
        let level_set = cert.level_set.clone();
        let report = query_and_commit(
            &mut self.adapter,
            self.oracle.as_mut(),
            &self.grid,
            cert,
            self.iteration,
            &mut self.state,
        )?;
        self.current = Some(level_set);
        self.iteration += 1;
        Ok(report)
    }

    /// Iterate until `policy` (or the hard iteration cap) says stop.
    pub fn run(&mut self, policy: TerminationPolicy) -> SafeSetResult<RunSummary> {
        log::info!("online loop starting: {policy:?}, cap {}", self.max_iterations);
        let mut steps: Vec<StepReport> = Vec::new();
        let mut stale: u64 = 0;

        let stop_reason = loop {
            let done = steps.len() as u64;
            if done >= self.max_iterations {
                break format!("max_iterations ({})", self.max_iterations);
            }
            if let TerminationPolicy::FixedIterations(n) = policy {
                if done >= n {
                    break format!("fixed_iterations ({n})");
                }
            }

            let prev_level = steps.last().map(|s| s.level);
            let report = self.step()?;
            let level = report.level;
            steps.push(report);

            if let TerminationPolicy::Stagnation {
                patience,
                min_growth,
            } = policy
            {
                match prev_level {
                    Some(p) if level - p <= min_growth => stale += 1,
                    _ => stale = 0,
                }
                if stale >= patience {
                    break format!("stagnation ({stale} iterations without growth > {min_growth})");
                }
            }
        };

        log::info!(
            "online loop stopped after {} iterations: {stop_reason}, final c={:?}",
            steps.len(),
            steps.last().map(|s| s.level)
        );
        Ok(RunSummary { steps, stop_reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExternalModel;
    use safeset_physics::{lyapunov, NoisyOracle};
    use safeset_types::build_grid;

    fn unit_setup() -> (Grid, LyapunovValues) {
        let grid = build_grid(-1.0, 1.0, 0.01).unwrap();
        let lv = lyapunov(&grid, 1.0).unwrap();
        (grid, lv)
    }

    #[test]
    fn test_select_max_variance_inside_mask() {
        let mask = SafeSetMask::from_vec(vec![false, true, true, true, false]);
        let var = [9.0, 0.1, 0.5, 0.2, 9.0];
        assert_eq!(select_most_uncertain(&mask, &var).unwrap(), 2);
    }

    #[test]
    fn test_select_tie_lowest_index() {
        let mask = SafeSetMask::full(4);
        let var = [0.1, 0.3, 0.3, 0.3];
        assert_eq!(select_most_uncertain(&mask, &var).unwrap(), 1);
    }

    #[test]
    fn test_select_empty_mask_errors() {
        let err = select_most_uncertain(&SafeSetMask::empty(3), &[1.0; 3]).unwrap_err();
        assert!(matches!(err, SafeSetError::EmptySafeSet(_)));
    }

    #[test]
    fn test_step_queries_inside_safe_set() {
        let (grid, lv) = unit_setup();
        let mut adapter = DynamicsModelAdapter::new(Box::new(ExternalModel::analytic(
            |x| -0.25 * x,
            |x| 0.001 * (1.0 + x),
        )));
        let mut oracle = NoisyOracle::new(|x: f64| -0.25 * x, 0.0, 3).unwrap();
        let params = CertificationParams {
            lipschitz: 0.25,
            tau: grid.tau(),
            beta: 2.0,
            accuracy: 1e-6,
        };
        let seed = grid.ball_mask(0.0, 0.2);
        let report = step(&mut adapter, &mut oracle, &grid, &lv, &params, Some(&seed)).unwrap();
        assert!(report.mask.contains(report.queried_index));
        assert!(report.mask.is_sublevel_set(&lv.v));
        assert_eq!(report.iteration, 0);
        assert_eq!(adapter.observations().len(), 1);
        assert!((report.observed_value + 0.25 * report.queried_state).abs() < 1e-12);
    }

    #[test]
    fn test_step_empty_safe_set_errors_without_query() {
        let (grid, lv) = unit_setup();
        // Expanding dynamics: V̇ > 0 everywhere except x = 0.
        let mut adapter =
            DynamicsModelAdapter::new(Box::new(ExternalModel::analytic(|x| x, |_| 0.0)));
        let mut oracle = NoisyOracle::new(|x: f64| x, 0.0, 0).unwrap();
        let params = CertificationParams {
            lipschitz: 1.0,
            tau: grid.tau(),
            beta: 1.0,
            accuracy: 1e-4,
        };
        let err = step(&mut adapter, &mut oracle, &grid, &lv, &params, None).unwrap_err();
        assert!(matches!(err, SafeSetError::EmptySafeSet(_)));
        assert!(adapter.observations().is_empty());
        assert_eq!(oracle.queries(), 0);
    }

    struct FailingOracle;

    impl DynamicsOracle for FailingOracle {
        fn observe(&mut self, _state: f64) -> SafeSetResult<f64> {
            Err(SafeSetError::Oracle("sensor offline".into()))
        }
    }

    #[test]
    fn test_failed_query_leaves_loop_idle() {
        let (grid, lv) = unit_setup();
        let adapter = DynamicsModelAdapter::new(Box::new(ExternalModel::analytic(
            |x| -0.25 * x,
            |_| 0.0,
        )));
        let seed = grid.ball_mask(0.0, 0.2);
        let params = CertificationParams {
            lipschitz: 0.25,
            tau: grid.tau(),
            beta: 2.0,
            accuracy: 1e-4,
        };
        let mut session = OnlineLoop::new(
            grid,
            lv,
            adapter,
            Box::new(FailingOracle),
            params,
            Some(seed),
            10,
        )
        .unwrap();
        let err = session.step().unwrap_err();
        assert!(matches!(err, SafeSetError::Oracle(_)));
        assert_eq!(session.state(), SamplerState::Idle);
        assert!(session.adapter().observations().is_empty());
        assert_eq!(session.iteration(), 0);
        assert!(session.current_level_set().is_none());
    }

    #[test]
    fn test_fixed_iterations_policy() {
        let cfg = SafeSetConfig {
            tau: 0.01,
            lipschitz: safeset_types::LipschitzConfig {
                vdot: Some(0.5),
                ..Default::default()
            },
            ..Default::default()
        };
        let model = crate::gp::GaussianProcess::new(0.2, 0.04, 1e-4, -0.25).unwrap();
        let oracle = NoisyOracle::new(|x: f64| -0.3 * x, 0.0, 11).unwrap();
        let mut session =
            OnlineLoop::from_config(&cfg, Box::new(model), Box::new(oracle)).unwrap();
        let summary = session.run(TerminationPolicy::FixedIterations(4)).unwrap();
        assert_eq!(summary.steps.len(), 4);
        assert_eq!(session.adapter().observations().len(), 4);
        assert!(summary.stop_reason.starts_with("fixed_iterations"));
    }

    #[test]
    fn test_max_iterations_caps_run() {
        let cfg = SafeSetConfig {
            tau: 0.01,
            max_iterations: 3,
            lipschitz: safeset_types::LipschitzConfig {
                vdot: Some(0.5),
                ..Default::default()
            },
            ..Default::default()
        };
        let model = crate::gp::GaussianProcess::from_config(&cfg.gp).unwrap();
        let oracle = NoisyOracle::new(|x: f64| -0.3 * x, 0.0, 5).unwrap();
        let mut session =
            OnlineLoop::from_config(&cfg, Box::new(model), Box::new(oracle)).unwrap();
        let summary = session.run(TerminationPolicy::FixedIterations(100)).unwrap();
        assert_eq!(summary.steps.len(), 3);
        assert!(summary.stop_reason.starts_with("max_iterations"));
    }

    #[test]
    fn test_stagnation_stops_on_saturated_set() {
        // Known linear model, no uncertainty: the first iteration already
        // certifies the whole grid, so c never grows again.
        let cfg = SafeSetConfig {
            tau: 0.01,
            patience: 2,
            lipschitz: safeset_types::LipschitzConfig {
                vdot: Some(0.25),
                ..Default::default()
            },
            ..Default::default()
        };
        let model = ExternalModel::analytic(|x| -0.25 * x, |_| 0.0);
        let oracle = NoisyOracle::new(|x: f64| -0.25 * x, 0.0, 1).unwrap();
        let mut session =
            OnlineLoop::from_config(&cfg, Box::new(model), Box::new(oracle)).unwrap();
        let summary = session.run(OnlineLoop::default_policy(&cfg)).unwrap();
        assert_eq!(summary.steps.len(), 3);
        assert!(summary.stop_reason.starts_with("stagnation"));
        assert_eq!(summary.steps[0].safe_count(), session.grid().len());
    }
}
