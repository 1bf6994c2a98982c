// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Safety Certifier
// ─────────────────────────────────────────────────────────────────────
//! Turns the V̇ upper bound U into a safe/unsafe labeling of the grid.
//!
//! Stage 1 (candidates): U_i ≤ T with T = −L·τ. Because V̇ is L-Lipschitz,
//! a candidate has V̇ < 0 on its whole grid cell, not just at x_i.
//!
//! Stage 2 (reachability): a candidate is safe only if a contiguous run
//! of candidates connects it to a trusted index. Trusted indices are the
//! seed region S0 or, without a seed, the single minimum of V. The scan
//! starts at each seed run and walks outward in both directions, halting
//! at the first non-candidate. Seed indices are safe whether or not they
//! are candidates.

use safeset_types::{ensure_same_len, SafeSetMask, SafeSetResult};

/// Stage 1 only: U_i ≤ T.
pub fn candidate_mask(u: &[f64], threshold: f64) -> SafeSetMask {
    SafeSetMask::from_vec(u.iter().map(|&ui| ui <= threshold).collect())
}

/// Maximal runs [start, end] (inclusive) of `true` in `mask`.
fn runs(mask: &SafeSetMask) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &s) in mask.as_slice().iter().enumerate() {
        match (s, start) {
            (true, None) => start = Some(i),
            (false, Some(st)) => {
                out.push((st, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(st) = start {
        out.push((st, mask.len() - 1));
    }
    out
}

/// Index of the minimum of `v`, lowest index on ties.
fn argmin(v: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &vi) in v.iter().enumerate() {
        match best {
            Some((_, b)) if b <= vi => {}
            _ => best = Some((i, vi)),
        }
    }
    best.map(|(i, _)| i)
}

/// Certify the safe set from the V̇ bound `u`.
///
/// `seed` is S0; when it is `None` or has no safe entries, propagation
/// starts from the minimum of `v` and yields an empty mask if that point
/// is not a candidate.
///
/// The mask may exclude the minimum of `v` when the seed lies away from
/// it; `max_levelset` then reports `EmptySafeSet`.
pub fn certify_safe_set(
    u: &[f64],
    threshold: f64,
    seed: Option<&SafeSetMask>,
    v: &[f64],
) -> SafeSetResult<SafeSetMask> {
    ensure_same_len("Lyapunov values", u.len(), v.len())?;
    let candidates = candidate_mask(u, threshold);
    let n = u.len();

    let mut safe = match seed {
        Some(s) if s.any() => {
            ensure_same_len("seed mask", n, s.len())?;
            s.clone()
        }
        _ => {
            let mut m = SafeSetMask::empty(n);
            match argmin(v) {
                Some(i0) if candidates.contains(i0) => m.set(i0, true),
                Some(i0) => {
                    log::error!(
                        "no seed and Lyapunov minimum (index {i0}) is not a candidate: \
                         U={:.4e} > T={threshold:.4e}",
                        u[i0]
                    );
                    return Ok(m);
                }
                None => return Ok(m),
            }
            m
        }
    };

    for (start, end) in runs(&safe) {
        // Left of the run.
        let mut i = start;
        while i > 0 && candidates.contains(i - 1) && !safe.contains(i - 1) {
            i -= 1;
            safe.set(i, true);
        }
        // Right of the run.
        let mut j = end;
        while j + 1 < n && candidates.contains(j + 1) && !safe.contains(j + 1) {
            j += 1;
            safe.set(j, true);
        }
    }

    log::debug!(
        "certified {} of {n} points ({} candidates, T={threshold:.4e})",
        safe.count(),
        candidates.count()
    );
    Ok(safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v_quad(n: usize) -> Vec<f64> {
        let c = (n / 2) as f64;
        (0..n).map(|i| (i as f64 - c).powi(2)).collect()
    }

    #[test]
    fn test_candidates_at_threshold_inclusive() {
        let m = candidate_mask(&[-1.0, -0.5, -0.4], -0.5);
        assert_eq!(m.as_slice(), &[true, true, false]);
    }

    #[test]
    fn test_isolated_pocket_rejected() {
        // Candidates at 0..=2 and 5..=6; seed at 1. The pocket at 5..=6
        // is separated by non-candidates and must stay unsafe.
        let u = [-1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0];
        let seed = SafeSetMask::from_vec(vec![false, true, false, false, false, false, false]);
        let safe = certify_safe_set(&u, -0.1, Some(&seed), &v_quad(7)).unwrap();
        assert_eq!(
            safe.as_slice(),
            &[true, true, true, false, false, false, false]
        );
    }

    #[test]
    fn test_seed_kept_even_if_not_candidate() {
        let u = [1.0, 1.0, 1.0, 1.0, 1.0];
        let seed = SafeSetMask::from_vec(vec![false, true, true, false, false]);
        let safe = certify_safe_set(&u, -0.1, Some(&seed), &v_quad(5)).unwrap();
        assert_eq!(safe, seed);
    }

    #[test]
    fn test_propagates_from_every_seed_run() {
        let mut u = vec![-1.0; 9];
        u[4] = 1.0;
        let seed = SafeSetMask::from_vec(vec![
            false, true, false, false, false, false, false, true, false,
        ]);
        let safe = certify_safe_set(&u, -0.1, Some(&seed), &v_quad(9)).unwrap();
        assert_eq!(
            safe.as_slice(),
            &[true, true, true, true, false, true, true, true, true]
        );
    }

    #[test]
    fn test_no_seed_starts_from_minimum() {
        // V minimum at index 3.
        let v = v_quad(6);
        let u = [1.0, -1.0, -1.0, -1.0, -1.0, -1.0];
        let safe = certify_safe_set(&u, -0.1, None, &v).unwrap();
        assert_eq!(safe.as_slice(), &[false, true, true, true, true, true]);
    }

    #[test]
    fn test_no_seed_minimum_not_candidate_is_empty() {
        let v = v_quad(5);
        let u = [-1.0, -1.0, 0.0, -1.0, -1.0];
        let safe = certify_safe_set(&u, -0.1, None, &v).unwrap();
        assert!(!safe.any());
    }

    #[test]
    fn test_empty_seed_falls_back_to_minimum() {
        let v = v_quad(5);
        let u = [-1.0; 5];
        let seed = SafeSetMask::empty(5);
        let safe = certify_safe_set(&u, -0.1, Some(&seed), &v).unwrap();
        assert_eq!(safe.count(), 5);
    }

    #[test]
    fn test_length_mismatch() {
        let seed = SafeSetMask::full(3);
        assert!(certify_safe_set(&[-1.0; 4], -0.1, Some(&seed), &v_quad(4)).is_err());
        assert!(certify_safe_set(&[-1.0; 4], -0.1, None, &v_quad(3)).is_err());
    }

    #[test]
    fn test_runs() {
        let m = SafeSetMask::from_vec(vec![true, true, false, true, false, true]);
        assert_eq!(runs(&m), vec![(0, 1), (3, 3), (5, 5)]);
        assert!(runs(&SafeSetMask::empty(3)).is_empty());
    }
}
