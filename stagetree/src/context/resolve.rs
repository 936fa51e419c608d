//! Inherited configuration lookups.
//!
//! Every lookup checks the local value first, then delegates to the parent,
//! then falls back to the pipeline's global default.

use super::{StageContext, StageParent};
use crate::report::{NoOpReporter, Reporter};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Converts an optional timeout to milliseconds, `-1` meaning "no timeout".
#[must_use]
pub fn timeout_ms(timeout: Option<Duration>) -> i64 {
    timeout.map_or(-1, |t| i64::try_from(t.as_millis()).unwrap_or(i64::MAX))
}

impl StageContext {
    fn parent_stage(&self) -> Option<&StageContext> {
        match self.parent.as_ref()? {
            StageParent::Stage(parent) => Some(parent.as_ref()),
            StageParent::Pipeline(_) => None,
        }
    }

    /// Ancestor stage names joined with `/`, ending in this stage's name.
    #[must_use]
    pub fn name_path(&self) -> String {
        match self.parent_stage() {
            Some(parent) => format!("{}/{}", parent.name_path(), self.def.name),
            None => self.def.name.clone(),
        }
    }

    /// Effective working directory. `None` means the process cwd.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        if let Some(dir) = self.def.working_dir.as_deref() {
            return Some(dir);
        }
        match self.parent.as_ref()? {
            StageParent::Stage(parent) => parent.working_dir(),
            StageParent::Pipeline(pipeline) => pipeline.working_dir(),
        }
    }

    /// Effective stage timeout. `None` means no timeout.
    #[must_use]
    pub fn effective_stage_timeout(&self) -> Option<Duration> {
        if self.def.stage_timeout.is_some() {
            return self.def.stage_timeout;
        }
        match self.parent.as_ref()? {
            StageParent::Stage(parent) => parent.effective_stage_timeout(),
            StageParent::Pipeline(pipeline) => pipeline.stage_timeout(),
        }
    }

    /// Effective per-step timeout. `None` means no timeout.
    #[must_use]
    pub fn effective_step_timeout(&self) -> Option<Duration> {
        if self.def.step_timeout.is_some() {
            return self.def.step_timeout;
        }
        match self.parent.as_ref()? {
            StageParent::Stage(parent) => parent.effective_step_timeout(),
            StageParent::Pipeline(pipeline) => pipeline.step_timeout(),
        }
    }

    /// Effective stage timeout in milliseconds, `-1` for none.
    #[must_use]
    pub fn effective_stage_timeout_ms(&self) -> i64 {
        timeout_ms(self.effective_stage_timeout())
    }

    /// Effective per-step timeout in milliseconds, `-1` for none.
    #[must_use]
    pub fn effective_step_timeout_ms(&self) -> i64 {
        timeout_ms(self.effective_step_timeout())
    }

    /// Looks up an environment variable through the whole chain.
    #[must_use]
    pub fn try_env_var(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.def.env.get(key) {
            return Some(value.as_str());
        }
        match self.parent.as_ref()? {
            StageParent::Stage(parent) => parent.try_env_var(key),
            StageParent::Pipeline(pipeline) => pipeline.try_env_var(key),
        }
    }

    /// Looks up a command-line argument. Only the pipeline holds them.
    #[must_use]
    pub fn try_cmd_arg(&self, key: &str) -> Option<&str> {
        match self.parent.as_ref()? {
            StageParent::Stage(parent) => parent.try_cmd_arg(key),
            StageParent::Pipeline(pipeline) => pipeline.try_cmd_arg(key),
        }
    }

    /// Command-line argument if present, else environment variable.
    #[must_use]
    pub fn cmd_arg_or_env_var(&self, key: &str) -> Option<&str> {
        self.try_cmd_arg(key).or_else(|| self.try_env_var(key))
    }

    /// Stage-declared environment overrides of the whole chain.
    ///
    /// Inner stages win over outer ones. The pipeline's global environment
    /// is not included.
    #[must_use]
    pub fn env_overrides(&self) -> HashMap<String, String> {
        let mut env = self
            .parent_stage()
            .map(StageContext::env_overrides)
            .unwrap_or_default();
        env.extend(self.def.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Whether step output should be shown without the stage prefix.
    ///
    /// An explicit local "use prefix" answers immediately. A local
    /// "no prefix" only holds if every ancestor up to the pipeline agrees,
    /// so it is confirmed the same way an unset value is inherited.
    #[must_use]
    pub fn effective_no_prefix(&self) -> bool {
        if self.def.no_prefix == Some(false) {
            return false;
        }
        match self.parent.as_ref() {
            Some(StageParent::Stage(parent)) => parent.effective_no_prefix(),
            Some(StageParent::Pipeline(pipeline)) => pipeline.no_prefix(),
            None => self.def.no_prefix.unwrap_or(false),
        }
    }

    /// Whether process output redirection is suppressed.
    ///
    /// A local "suppress" wins without consulting ancestors.
    #[must_use]
    pub fn effective_no_redirect(&self) -> bool {
        if self.def.no_redirect == Some(true) {
            return true;
        }
        match self.parent.as_ref() {
            Some(StageParent::Stage(parent)) => parent.effective_no_redirect(),
            Some(StageParent::Pipeline(pipeline)) => pipeline.no_redirect(),
            None => false,
        }
    }

    /// The reporter of the pipeline this stage is attached to.
    ///
    /// Detached stages report nowhere.
    #[must_use]
    pub fn reporter(&self) -> Arc<dyn Reporter> {
        self.pipeline().map_or_else(
            || Arc::new(NoOpReporter) as Arc<dyn Reporter>,
            |pipeline| Arc::clone(pipeline.reporter()),
        )
    }
}
