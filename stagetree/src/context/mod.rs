//! The stage tree and its inherited configuration.
//!
//! This module provides:
//! - Immutable stage templates with run-time parent attachment
//! - The pipeline root context with global defaults
//! - Resolution of inherited settings through the parent chain

mod builder;
mod pipeline;
mod resolve;
mod stage;

pub use builder::StageBuilder;
pub use pipeline::{PipelineContext, RunMode};
pub use resolve::timeout_ms;
pub use stage::{Predicate, StageContext, StageIndex, StageParent, Step};
