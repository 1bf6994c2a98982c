// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all safe-set kernel failures.
///
/// Every variant is deterministic given its inputs: nothing here is
/// transient, so callers must change data or parameters rather than retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SafeSetError {
    /// Mismatched sequence lengths, non-positive τ or L, bad grid bounds,
    /// indefinite quadratic form, or an unparseable config.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation that needs at least one safe point received none.
    #[error("empty safe set: {0}")]
    EmptySafeSet(String),

    /// The dynamics model could not produce a posterior (ill-conditioned
    /// regression, non-finite prediction).
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The true-dynamics oracle failed to return an observation.
    #[error("oracle error: {0}")]
    Oracle(String),
}

pub type SafeSetResult<T> = Result<T, SafeSetError>;

/// Reject two sequences of different length with a `Configuration` error.
pub fn ensure_same_len(what: &str, expected: usize, got: usize) -> SafeSetResult<()> {
    if expected != got {
        return Err(SafeSetError::Configuration(format!(
            "{what}: length mismatch (expected {expected}, got {got})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let e = SafeSetError::EmptySafeSet("no seed".into());
        assert_eq!(e.to_string(), "empty safe set: no seed");
        let e = SafeSetError::ModelUnavailable("cholesky".into());
        assert_eq!(e.to_string(), "model unavailable: cholesky");
    }

    #[test]
    fn test_ensure_same_len() {
        assert!(ensure_same_len("mean", 3, 3).is_ok());
        let err = ensure_same_len("mean", 3, 2).unwrap_err();
        assert!(matches!(err, SafeSetError::Configuration(_)));
        assert!(err.to_string().contains("expected 3, got 2"));
    }
}
