// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Certification Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Certified region of attraction for a scalar system ẋ = f(x) whose
//! dynamics are only known through a probabilistic model.
//!
//! Pipeline per iteration:
//!   model posterior (μ, σ²) → V̇ upper bound U → candidates U ≤ −L·τ
//!   → contiguous region from the seed → largest sublevel set {V ≤ c}
//!   → query the most uncertain safe state → update the model.

pub mod bound;
pub mod certifier;
pub mod gp;
pub mod levelset;
pub mod model;
pub mod sampler;

pub use bound::{compute_v_dot_bound, compute_v_dot_distribution};
pub use certifier::{candidate_mask, certify_safe_set};
pub use gp::GaussianProcess;
pub use levelset::{max_levelset, max_levelset_with_floor};
pub use model::{DynamicsModel, DynamicsModelAdapter, ExternalModel};
pub use sampler::{
    certify, select_most_uncertain, step, Certification, CertificationParams, OnlineLoop,
    SamplerState, TerminationPolicy,
};

// Re-export the types and physics layers so callers need one import.
pub use safeset_physics as physics;
pub use safeset_types as types;
