//! Fluent construction of immutable stage trees.

use super::stage::{Predicate, StageDef};
use super::{StageContext, Step};
use crate::actions::{ActionOutput, FnAction, LeafAction, StepContext};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for a [`StageContext`].
///
/// ```rust,ignore
/// let stage = StageContext::builder("build")
///     .parallel()
///     .step_timeout(Duration::from_secs(60))
///     .env("PROFILE", "release")
///     .action(CommandAction::new("cargo", ["build"]))
///     .stage(test_stage)
///     .build();
/// ```
pub struct StageBuilder {
    name: String,
    predicate: Predicate,
    parallel: bool,
    shuffle: bool,
    stage_timeout: Option<Duration>,
    step_timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
    exit_codes: HashSet<i32>,
    fail_if_ignored: bool,
    no_prefix: Option<bool>,
    no_redirect: Option<bool>,
    steps: Vec<Step>,
}

impl StageBuilder {
    /// Creates a builder for an always-active, sequential stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(|_| true),
            parallel: false,
            shuffle: false,
            stage_timeout: None,
            step_timeout: None,
            working_dir: None,
            env: HashMap::new(),
            exit_codes: HashSet::from([0]),
            fail_if_ignored: false,
            no_prefix: None,
            no_redirect: None,
            steps: Vec::new(),
        }
    }

    /// Sets the activation predicate.
    #[must_use]
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StageContext) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Sets a shared activation predicate, such as one from
    /// [`conditions`](crate::conditions).
    #[must_use]
    pub fn condition(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Runs the steps concurrently.
    #[must_use]
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Shuffles the step order on every run.
    #[must_use]
    pub fn shuffle(mut self) -> Self {
        self.shuffle = true;
        self
    }

    /// Sets the stage timeout.
    #[must_use]
    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Sets the per-step timeout.
    #[must_use]
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds an environment override. A repeated key replaces the old value.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Adds an acceptable exit code on top of the default `0`.
    #[must_use]
    pub fn accept_exit_code(mut self, code: i32) -> Self {
        self.exit_codes.insert(code);
        self
    }

    /// Makes an inactive stage abort the pipeline.
    #[must_use]
    pub fn fail_if_ignored(mut self) -> Self {
        self.fail_if_ignored = true;
        self
    }

    /// Sets the local "no prefix" flag.
    #[must_use]
    pub fn no_prefix(mut self, no_prefix: bool) -> Self {
        self.no_prefix = Some(no_prefix);
        self
    }

    /// Sets the local "no redirect" flag.
    #[must_use]
    pub fn no_redirect(mut self, no_redirect: bool) -> Self {
        self.no_redirect = Some(no_redirect);
        self
    }

    /// Appends a leaf action step.
    #[must_use]
    pub fn action(mut self, action: impl LeafAction + 'static) -> Self {
        self.steps.push(Step::Action(Arc::new(action)));
        self
    }

    /// Appends an async closure as a leaf action step.
    #[must_use]
    pub fn run<F, Fut>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ActionOutput>> + Send + 'static,
    {
        self.action(FnAction::new(name, func))
    }

    /// Appends a nested stage step.
    #[must_use]
    pub fn stage(mut self, stage: StageContext) -> Self {
        self.steps.push(Step::Stage(stage));
        self
    }

    /// Finishes the stage.
    #[must_use]
    pub fn build(self) -> StageContext {
        StageContext {
            def: Arc::new(StageDef {
                name: self.name,
                predicate: self.predicate,
                parallel: self.parallel,
                shuffle: self.shuffle,
                stage_timeout: self.stage_timeout,
                step_timeout: self.step_timeout,
                working_dir: self.working_dir,
                env: self.env,
                exit_codes: self.exit_codes,
                fail_if_ignored: self.fail_if_ignored,
                no_prefix: self.no_prefix,
                no_redirect: self.no_redirect,
                steps: self.steps,
            }),
            parent: None,
            verifying: false,
        }
    }
}

impl std::fmt::Debug for StageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageBuilder")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}
