//! Root context supplying global configuration to every stage.

use crate::config::PipelineConfig;
use crate::report::{LoggingReporter, Reporter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How the pipeline treats its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Run the steps of every active stage.
    #[default]
    Execute,
    /// Only evaluate activation predicates, with diagnostics enabled.
    Verify,
}

impl RunMode {
    /// Returns true for [`RunMode::Verify`].
    #[must_use]
    pub fn is_verify(self) -> bool {
        matches!(self, Self::Verify)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute => write!(f, "execute"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "execute" | "run" => Ok(Self::Execute),
            "verify" => Ok(Self::Verify),
            other => Err(format!("unknown run mode: {other}")),
        }
    }
}

/// Global, read-only configuration at the root of every stage tree.
pub struct PipelineContext {
    env: HashMap<String, String>,
    args: Vec<String>,
    stage_timeout: Option<Duration>,
    step_timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
    mode: RunMode,
    no_prefix: bool,
    no_redirect: bool,
    reporter: Arc<dyn Reporter>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    /// Creates an empty pipeline context: no env, no args, no timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: HashMap::new(),
            args: Vec::new(),
            stage_timeout: None,
            step_timeout: None,
            working_dir: None,
            mode: RunMode::Execute,
            no_prefix: false,
            no_redirect: false,
            reporter: Arc::new(LoggingReporter::default()),
        }
    }

    /// Builds a context from loaded configuration.
    ///
    /// The process environment is captured first; entries of `config.env`
    /// override it.
    #[must_use]
    pub fn from_config(config: &PipelineConfig, args: Vec<String>) -> Self {
        let mut env: HashMap<String, String> = std::env::vars().collect();
        env.extend(config.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self {
            env,
            args,
            stage_timeout: config.stage_timeout(),
            step_timeout: config.step_timeout(),
            working_dir: config.working_dir.clone(),
            mode: config.mode,
            no_prefix: config.no_prefix,
            no_redirect: config.no_redirect,
            reporter: Arc::new(LoggingReporter::default()),
        }
    }

    /// Sets a global environment variable.
    #[must_use]
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the command-line tokens.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the default stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Sets the default per-step timeout.
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Sets the default working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the run mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the default "no prefix" display flag.
    #[must_use]
    pub fn with_no_prefix(mut self, no_prefix: bool) -> Self {
        self.no_prefix = no_prefix;
        self
    }

    /// Sets the default "no redirect" flag.
    #[must_use]
    pub fn with_no_redirect(mut self, no_redirect: bool) -> Self {
        self.no_redirect = no_redirect;
        self
    }

    /// Sets the reporter receiving run events.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Looks up a global environment variable.
    #[must_use]
    pub fn try_env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Looks up the value following `key` in the command-line tokens.
    ///
    /// A trailing `key` yields `""`.
    #[must_use]
    pub fn try_cmd_arg(&self, key: &str) -> Option<&str> {
        let pos = self.args.iter().position(|token| token == key)?;
        Some(self.args.get(pos + 1).map_or("", String::as_str))
    }

    /// Returns the command-line tokens.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the default stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout
    }

    /// Returns the default per-step timeout.
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// Returns the default working directory.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Returns the run mode.
    #[must_use]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Returns the default "no prefix" flag.
    #[must_use]
    pub fn no_prefix(&self) -> bool {
        self.no_prefix
    }

    /// Returns the default "no redirect" flag.
    #[must_use]
    pub fn no_redirect(&self) -> bool {
        self.no_redirect
    }

    /// Returns the reporter.
    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("env_vars", &self.env.len())
            .field("args", &self.args)
            .field("stage_timeout", &self.stage_timeout)
            .field("step_timeout", &self.step_timeout)
            .field("working_dir", &self.working_dir)
            .field("mode", &self.mode)
            .field("no_prefix", &self.no_prefix)
            .field("no_redirect", &self.no_redirect)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_arg_lookup() {
        let ctx = PipelineContext::new().with_args(["--target", "release", "--verbose"]);
        assert_eq!(ctx.try_cmd_arg("--target"), Some("release"));
        assert_eq!(ctx.try_cmd_arg("--verbose"), Some(""));
        assert_eq!(ctx.try_cmd_arg("--missing"), None);
    }

    #[test]
    fn test_cmd_arg_first_occurrence_wins() {
        let ctx = PipelineContext::new().with_args(["-p", "a", "-p", "b"]);
        assert_eq!(ctx.try_cmd_arg("-p"), Some("a"));
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("verify".parse::<RunMode>(), Ok(RunMode::Verify));
        assert_eq!(" Execute ".parse::<RunMode>(), Ok(RunMode::Execute));
        assert!("dry".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_from_config_overrides_process_env() {
        let mut config = PipelineConfig::default();
        config.env.insert("PATH".to_string(), "/custom/bin".to_string());
        config.stage_timeout_ms = 2_000;

        let ctx = PipelineContext::from_config(&config, vec!["build".to_string()]);
        assert_eq!(ctx.try_env_var("PATH"), Some("/custom/bin"));
        assert_eq!(ctx.stage_timeout(), Some(Duration::from_millis(2_000)));
        assert_eq!(ctx.step_timeout(), None);
        assert_eq!(ctx.args(), ["build".to_string()]);
    }
}
