// ─────────────────────────────────────────────────────────────────────
// SafeSet Kernel — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! Lyapunov safe-set kernel: the grid, safe-set masks, dynamics
//! posteriors, observation sets, and online-loop reports.

pub mod config;
pub mod error;
pub mod grid;
pub mod mask;
pub mod posterior;
pub mod report;

pub use config::{GpConfig, LipschitzConfig, SafeSetConfig, SeedRegion};
pub use error::{ensure_same_len, SafeSetError, SafeSetResult};
pub use grid::{build_grid, Grid, MAX_GRID_POINTS};
pub use mask::{LevelSet, SafeSetMask};
pub use posterior::{DynamicsPosterior, Observation, ObservationSet};
pub use report::{RunSummary, StepReport};
