//! Leaf actions: the work a step actually performs.
//!
//! This module provides:
//! - The LeafAction trait and its result type
//! - Closure-backed, sleeping and external-process actions

mod command;
mod sleep;

pub use command::CommandAction;
pub use sleep::SleepAction;

use crate::cancellation::CancelSignal;
use crate::context::StageContext;
use crate::report::step_prefix;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::future::Future;

/// Which scope a soft cancellation aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelScope {
    /// Abort only the current step.
    Step,
    /// Abort the remaining steps of the current stage.
    Stage,
}

/// Result of a leaf action.
///
/// Soft cancellation counts as success at every level; it only controls
/// which work is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutput {
    /// The action succeeded.
    Success,
    /// The action failed. An empty message fails silently.
    Failed(String),
    /// The action voluntarily aborted the given scope.
    SoftCancel(CancelScope),
}

impl ActionOutput {
    /// Creates a failure output.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Converts a plain `Result<(), String>` into an output.
    #[must_use]
    pub fn from_result(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(message) => Self::Failed(message),
        }
    }

    /// Returns true if the output counts as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// What a leaf action gets to see while it runs.
#[derive(Debug, Clone)]
pub struct StepContext {
    stage: StageContext,
    index: usize,
    signal: CancelSignal,
}

impl StepContext {
    /// Creates a step context.
    #[must_use]
    pub fn new(stage: StageContext, index: usize, signal: CancelSignal) -> Self {
        Self {
            stage,
            index,
            signal,
        }
    }

    /// The stage the step belongs to, attached to its ancestors.
    #[must_use]
    pub fn stage(&self) -> &StageContext {
        &self.stage
    }

    /// Declared index of the step.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The step-level signal. Long-running actions must observe it.
    #[must_use]
    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    /// Display prefix of the step.
    #[must_use]
    pub fn prefix(&self) -> String {
        step_prefix(&self.stage.name_path(), self.index)
    }
}

/// A leaf step.
///
/// Returning `Err` counts as an unhandled exception: the step fails and the
/// error is recorded in the stage outcome.
#[async_trait]
pub trait LeafAction: Send + Sync + Debug {
    /// Returns the name of the action.
    fn name(&self) -> &str;

    /// Runs the action.
    async fn run(&self, ctx: &StepContext) -> anyhow::Result<ActionOutput>;
}

/// An async function-based action.
pub struct FnAction<F> {
    name: String,
    func: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ActionOutput>> + Send + 'static,
{
    /// Creates a new function-based action.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnAction<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> LeafAction for FnAction<F>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ActionOutput>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<ActionOutput> {
        (self.func)(ctx.clone()).await
    }
}
