//! Testing utilities for stage trees.
//!
//! This module provides:
//! - Scripted leaf actions and a shared execution log
//! - Assertions for outcomes and reported events

mod assertions;
mod mocks;

pub use assertions::{
    assert_cancelled_reported, assert_exception_count, assert_outcome_failed,
    assert_outcome_succeeded, assert_step_error_reported,
};
pub use mocks::{ErrorAction, ExecutionLog, PanicAction, CaptureAction, RecordingAction};
