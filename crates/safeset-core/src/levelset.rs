// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Level-Set Maximizer
// ─────────────────────────────────────────────────────────────────────
//! Largest Lyapunov sublevel set {i : V_i ≤ c} contained in a safe mask.
//!
//! Lyapunov arguments hold only for sublevel sets: if V̇ < 0 on
//! {V ≤ c}, trajectories that start inside stay inside. The certifier's
//! contiguous region is therefore shrunk to the largest such set.
//!
//! Search: bisection over the sorted distinct grid levels of V, starting
//! from [floor, max V]. It stops once the bracket spans no more than the
//! accuracy ε in V or no grid level lies strictly inside it, so it ends
//! after at most ⌈log₂ N⌉ + 1 feasibility checks for any ε > 0. The
//! result is always a grid level, so c never lands between two points.
//!
//! The sublevel set must contain the minimum of V. A mask that misses it
//! (for instance a seed region away from the origin) admits no sublevel
//! set and is reported as `EmptySafeSet`.

use safeset_types::{ensure_same_len, LevelSet, SafeSetError, SafeSetMask, SafeSetResult};

/// True if every grid point with V_i ≤ c is safe.
#[inline]
fn sublevel_inside(mask: &[bool], v: &[f64], c: f64) -> bool {
    v.iter().zip(mask).all(|(&vi, &s)| vi > c || s)
}

/// Largest c (to accuracy ε) with {V ≤ c} inside `mask`.
///
/// Errors with `EmptySafeSet` when `mask` is empty or does not contain
/// the minimum of V.
pub fn max_levelset(mask: &SafeSetMask, v: &[f64], accuracy: f64) -> SafeSetResult<LevelSet> {
    max_levelset_with_floor(mask, v, accuracy, None)
}

/// As `max_levelset`, starting the bisection from a level already known
/// to be feasible.
///
/// The online loop passes the previous iteration's level here so the
/// result never drops below it. An infeasible `floor` is ignored.
pub fn max_levelset_with_floor(
    mask: &SafeSetMask,
    v: &[f64],
    accuracy: f64,
    floor: Option<f64>,
) -> SafeSetResult<LevelSet> {
    ensure_same_len("Lyapunov values", mask.len(), v.len())?;
    if !(accuracy.is_finite() && accuracy > 0.0) {
        return Err(SafeSetError::Configuration(format!(
            "level-set accuracy must be > 0, got {accuracy}"
        )));
    }
    if !mask.any() {
        return Err(SafeSetError::EmptySafeSet(
            "level-set maximization needs at least one safe point".to_string(),
        ));
    }
    if let Some(bad) = v.iter().find(|vi| !vi.is_finite()) {
        return Err(SafeSetError::Configuration(format!(
            "Lyapunov values must be finite, got {bad}"
        )));
    }

    let safe = mask.as_slice();
    let mut levels = v.to_vec();
    levels.sort_by(f64::total_cmp);
    levels.dedup();
    let top = levels.len() - 1;

    if !sublevel_inside(safe, v, levels[0]) {
        return Err(SafeSetError::EmptySafeSet(format!(
            "safe mask excludes the Lyapunov minimum (V = {:.4e}); \
             no sublevel set fits",
            levels[0]
        )));
    }

    // Index of the largest grid level not above a feasible floor.
    let mut lo = match floor {
        Some(f) if f.is_finite() && sublevel_inside(safe, v, f) => {
            levels.partition_point(|&l| l <= f).saturating_sub(1)
        }
        _ => 0,
    };

    let c = if sublevel_inside(safe, v, levels[top]) {
        levels[top]
    } else {
        // levels[lo] feasible, levels[hi] infeasible.
        let mut hi = top;
        while hi - lo > 1 && levels[hi] - levels[lo] > accuracy {
            let mid = lo + (hi - lo) / 2;
            if sublevel_inside(safe, v, levels[mid]) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        levels[lo]
    };

    let level_mask = SafeSetMask::from_vec(v.iter().map(|&vi| vi <= c).collect());
    log::debug!(
        "max level c={c:.6e}: {} of {} points (mask had {})",
        level_mask.count(),
        v.len(),
        mask.count()
    );
    Ok(LevelSet {
        level: c,
        mask: level_mask,
    })
}
