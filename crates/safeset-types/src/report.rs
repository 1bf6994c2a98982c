// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Online Loop Reports
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::mask::SafeSetMask;

/// Outcome of one active-sampling iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Zero-based iteration counter within the session.
    pub iteration: u64,
    /// Certified Lyapunov level c for this iteration.
    pub level: f64,
    /// Certified sublevel set {i : V_i ≤ c}.
    pub mask: SafeSetMask,
    /// Grid index that was queried.
    pub queried_index: usize,
    /// State that was queried.
    pub queried_state: f64,
    /// Noisy dynamics value returned by the oracle.
    pub observed_value: f64,
    /// Posterior variance at the queried point before the update.
    pub max_safe_variance: f64,
}

impl StepReport {
    pub fn safe_count(&self) -> usize {
        self.mask.count()
    }
}

/// Summary of a finished online-loop run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: Vec<StepReport>,
    /// Why the loop stopped.
    pub stop_reason: String,
}

impl RunSummary {
    /// Certified level after the last iteration.
    pub fn final_level(&self) -> Option<f64> {
        self.steps.last().map(|s| s.level)
    }

    /// Level sequence c_0, c_1, ...
    pub fn levels(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.level).collect()
    }
}
