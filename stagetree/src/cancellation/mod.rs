//! Cooperative cancellation and timeout composition.
//!
//! This module provides:
//! - CancelSignal, a manual flag plus deadline with parent/child linking
//! - StageSignals, the layered signals built for each stage run

mod compose;
mod signal;

pub use compose::StageSignals;
pub use signal::CancelSignal;
