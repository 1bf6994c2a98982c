// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Safe-Set Mask Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_len, SafeSetResult};

/// Boolean labeling of grid points: `true` where certified safe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeSetMask {
    safe: Vec<bool>,
}

impl SafeSetMask {
    pub fn from_vec(safe: Vec<bool>) -> Self {
        Self { safe }
    }

    /// All-false mask of length `n`.
    pub fn empty(n: usize) -> Self {
        Self {
            safe: vec![false; n],
        }
    }

    /// All-true mask of length `n`.
    pub fn full(n: usize) -> Self {
        Self { safe: vec![true; n] }
    }

    pub fn len(&self) -> usize {
        self.safe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.safe.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.safe
    }

    /// Number of safe points.
    pub fn count(&self) -> usize {
        self.safe.iter().filter(|&&s| s).count()
    }

    /// True if at least one point is safe.
    pub fn any(&self) -> bool {
        self.safe.iter().any(|&s| s)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.safe.get(index).copied().unwrap_or(false)
    }

    pub fn set(&mut self, index: usize, safe: bool) {
        if let Some(cell) = self.safe.get_mut(index) {
            *cell = safe;
        }
    }

    /// Indices of safe points in grid order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.safe
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| s.then_some(i))
    }

    /// Pointwise OR of two masks of equal length.
    pub fn union(&self, other: &SafeSetMask) -> SafeSetResult<SafeSetMask> {
        ensure_same_len("mask union", self.len(), other.len())?;
        Ok(Self::from_vec(
            self.safe
                .iter()
                .zip(&other.safe)
                .map(|(&a, &b)| a || b)
                .collect(),
        ))
    }

    /// True if every safe point of `other` is also safe here.
    pub fn is_superset_of(&self, other: &SafeSetMask) -> bool {
        self.len() == other.len()
            && other
                .safe
                .iter()
                .zip(&self.safe)
                .all(|(&o, &s)| !o || s)
    }

    /// Largest V over the safe points, `None` for an empty mask.
    pub fn level(&self, v: &[f64]) -> Option<f64> {
        self.indices()
            .filter_map(|i| v.get(i).copied())
            .fold(None, |acc: Option<f64>, vi| Some(acc.map_or(vi, |a| a.max(vi))))
    }

    /// True if the mask equals {i : V_i ≤ c} for some scalar c.
    ///
    /// An empty mask qualifies (any c below min V).
    pub fn is_sublevel_set(&self, v: &[f64]) -> bool {
        if v.len() != self.len() {
            return false;
        }
        match self.level(v) {
            None => true,
            Some(c) => self.safe.iter().zip(v).all(|(&s, &vi)| s == (vi <= c)),
        }
    }
}

/// Result of a level-set maximization: the level c and {i : V_i ≤ c}.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub level: f64,
    pub mask: SafeSetMask,
}
