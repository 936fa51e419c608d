//! # Stagetree
//!
//! A hierarchical stage execution engine for CI and build pipelines.
//!
//! A pipeline is a tree of stages. Each stage holds ordered steps, and a
//! step is either a leaf action or another stage. Stagetree provides:
//!
//! - **Inherited configuration**: environment, timeouts, working directory
//!   and output policies resolve through the parent chain
//! - **Sequential and parallel steps**: with stop-on-failure and
//!   voluntary soft cancellation
//! - **Layered cancellation**: external, stage deadline, step error and
//!   step deadline signals, bounding whole nested trees
//! - **Event reporting**: every lifecycle change goes to a pluggable
//!   [`Reporter`](report::Reporter)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagetree::prelude::*;
//!
//! let tests = StageContext::builder("test")
//!     .parallel()
//!     .action(CommandAction::new("cargo", ["test", "--lib"]))
//!     .action(CommandAction::new("cargo", ["test", "--doc"]))
//!     .build();
//!
//! let pipeline = Pipeline::new(PipelineContext::new())
//!     .stage(StageContext::builder("build").action(CommandAction::new("cargo", ["build"])).build())
//!     .stage(tests);
//!
//! let outcome = pipeline.run(CancelSignal::new()).await?;
//! std::process::exit(outcome.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod cancellation;
pub mod conditions;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod outcome;
pub mod pipeline;
pub mod report;
pub mod testing;

pub use engine::run;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{
        ActionOutput, CancelScope, CommandAction, FnAction, LeafAction, SleepAction, StepContext,
    };
    pub use crate::cancellation::{CancelSignal, StageSignals};
    pub use crate::conditions;
    pub use crate::config::PipelineConfig;
    pub use crate::context::{
        PipelineContext, Predicate, RunMode, StageBuilder, StageContext, StageIndex, StageParent,
        Step,
    };
    pub use crate::engine::run;
    pub use crate::errors::{StageError, StepException};
    pub use crate::observability::{init_tracing, LogFormat, SpanTimer};
    pub use crate::outcome::Outcome;
    pub use crate::pipeline::{Pipeline, PipelineOutcome, StageCheck};
    pub use crate::report::{
        CollectingReporter, LoggingReporter, NoOpReporter, Reporter, RunEvent,
    };
}
