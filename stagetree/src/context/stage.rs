//! Stage templates, steps and run-time parent linkage.

use super::{PipelineContext, StageBuilder};
use crate::actions::LeafAction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Activation predicate of a stage.
pub type Predicate = Arc<dyn Fn(&StageContext) -> bool + Send + Sync>;

/// Position of a stage, used for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageIndex {
    /// Top-level position within the pipeline.
    Stage(usize),
    /// Position within the parent stage's steps.
    Step(usize),
}

impl fmt::Display for StageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(i) => write!(f, "stage[{i}]"),
            Self::Step(i) => write!(f, "step[{i}]"),
        }
    }
}

/// A single step of a stage.
#[derive(Clone)]
pub enum Step {
    /// A leaf action.
    Action(Arc<dyn LeafAction>),
    /// A nested stage.
    Stage(StageContext),
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(action) => f.debug_tuple("Action").field(action).finish(),
            Self::Stage(stage) => f.debug_tuple("Stage").field(&stage.name()).finish(),
        }
    }
}

/// The ancestor a running stage was attached to.
///
/// This is a shared value copy of the ancestor, never an owning edge back
/// into a live parent.
#[derive(Debug, Clone)]
pub enum StageParent {
    /// The stage runs as a step of another stage.
    Stage(Arc<StageContext>),
    /// The stage runs at the top level of a pipeline.
    Pipeline(Arc<PipelineContext>),
}

/// Immutable stage definition shared by every copy of a stage.
pub(crate) struct StageDef {
    pub(crate) name: String,
    pub(crate) predicate: Predicate,
    pub(crate) parallel: bool,
    pub(crate) shuffle: bool,
    pub(crate) stage_timeout: Option<Duration>,
    pub(crate) step_timeout: Option<Duration>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) env: HashMap<String, String>,
    pub(crate) exit_codes: HashSet<i32>,
    pub(crate) fail_if_ignored: bool,
    pub(crate) no_prefix: Option<bool>,
    pub(crate) no_redirect: Option<bool>,
    pub(crate) steps: Vec<Step>,
}

/// A stage of the pipeline tree.
///
/// The definition is built once by [`StageBuilder`] and never changes.
/// Running a stage as a child produces a copy carrying its parent; the
/// template itself stays parentless and can be reused under other parents.
#[derive(Clone)]
pub struct StageContext {
    pub(crate) def: Arc<StageDef>,
    pub(crate) parent: Option<StageParent>,
    pub(crate) verifying: bool,
}

impl StageContext {
    /// Starts building a stage.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> StageBuilder {
        StageBuilder::new(name)
    }

    /// Returns the local stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Returns the steps in declared order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.def.steps
    }

    /// Returns true if steps run concurrently.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.def.parallel
    }

    /// Returns true if the step order is shuffled on every run.
    #[must_use]
    pub fn is_shuffled(&self) -> bool {
        self.def.shuffle
    }

    /// Returns true if an inactive stage aborts the pipeline.
    #[must_use]
    pub fn fail_if_ignored(&self) -> bool {
        self.def.fail_if_ignored
    }

    /// Returns the locally declared environment overrides.
    #[must_use]
    pub fn local_env(&self) -> &HashMap<String, String> {
        &self.def.env
    }

    /// Returns the locally declared acceptable exit codes.
    #[must_use]
    pub fn exit_codes(&self) -> &HashSet<i32> {
        &self.def.exit_codes
    }

    /// Returns the parent this copy was attached to, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&StageParent> {
        self.parent.as_ref()
    }

    /// Returns a copy of this stage attached to `parent`.
    #[must_use]
    pub fn with_parent(&self, parent: StageParent) -> Self {
        Self {
            def: Arc::clone(&self.def),
            parent: Some(parent),
            verifying: false,
        }
    }

    /// Returns a copy of this stage in verification mode.
    #[must_use]
    pub fn verifying(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            parent: self.parent.clone(),
            verifying: true,
        }
    }

    /// Returns true if predicates should explain themselves instead of
    /// silently answering.
    #[must_use]
    pub fn is_verifying(&self) -> bool {
        self.verifying || self.pipeline().is_some_and(|p| p.mode().is_verify())
    }

    /// Evaluates the activation predicate.
    #[must_use]
    pub fn is_active(&self) -> bool {
        (self.def.predicate)(self)
    }

    /// Walks up to the pipeline root, if the stage is attached to one.
    #[must_use]
    pub fn pipeline(&self) -> Option<&PipelineContext> {
        match self.parent.as_ref()? {
            StageParent::Stage(parent) => parent.pipeline(),
            StageParent::Pipeline(pipeline) => Some(pipeline.as_ref()),
        }
    }
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("name", &self.def.name)
            .field("parallel", &self.def.parallel)
            .field("steps", &self.def.steps)
            .field("attached", &self.parent.is_some())
            .field("verifying", &self.verifying)
            .finish_non_exhaustive()
    }
}
