// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Physics
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Physics side of the safe-set kernel: the quadratic Lyapunov oracle,
//! Lipschitz bounds for V̇ and the discretization threshold, and the
//! true-dynamics oracles queried by the active sampler.

pub mod dynamics;
pub mod lipschitz;
pub mod lyapunov;

pub use dynamics::{DynamicsOracle, NoisyOracle, SyntheticDynamics};
pub use lipschitz::{
    estimate_sample_path, rbf_kernel_dynamics_bound, safety_threshold, LipschitzConstant,
    LipschitzSource, SessionLipschitz,
};
pub use lyapunov::{lyapunov, LyapunovValues, QuadraticLyapunov};
