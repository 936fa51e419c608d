//! Pipeline-wide configuration.
//!
//! Sources in increasing precedence: built-in defaults, a JSON file, then
//! `STAGETREE_*` environment variables.

use crate::context::RunMode;
use crate::errors::StageError;
use crate::observability::LogFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the default stage timeout.
pub const ENV_STAGE_TIMEOUT_MS: &str = "STAGETREE_STAGE_TIMEOUT_MS";
/// Environment variable overriding the default step timeout.
pub const ENV_STEP_TIMEOUT_MS: &str = "STAGETREE_STEP_TIMEOUT_MS";
/// Environment variable selecting the run mode.
pub const ENV_MODE: &str = "STAGETREE_MODE";
/// Environment variable overriding the default "no prefix" flag.
pub const ENV_NO_PREFIX: &str = "STAGETREE_NO_PREFIX";
/// Environment variable overriding the default "no redirect" flag.
pub const ENV_NO_REDIRECT: &str = "STAGETREE_NO_REDIRECT";
/// Environment variable overriding the working directory.
pub const ENV_WORKING_DIR: &str = "STAGETREE_WORKING_DIR";
/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "STAGETREE_LOG_FORMAT";

/// Global defaults for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Default stage timeout in milliseconds, `-1` for none.
    #[serde(default = "default_timeout_ms")]
    pub stage_timeout_ms: i64,
    /// Default per-step timeout in milliseconds, `-1` for none.
    #[serde(default = "default_timeout_ms")]
    pub step_timeout_ms: i64,
    /// Execute steps, or only verify activation predicates.
    #[serde(default)]
    pub mode: RunMode,
    /// Default for stages that do not set "no prefix".
    #[serde(default)]
    pub no_prefix: bool,
    /// Default for stages that do not set "no redirect".
    #[serde(default)]
    pub no_redirect: bool,
    /// Default working directory. `None` means the process cwd.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Extra global environment entries, overriding the process env.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_timeout_ms() -> i64 {
    -1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: default_timeout_ms(),
            step_timeout_ms: default_timeout_ms(),
            mode: RunMode::default(),
            no_prefix: false,
            no_redirect: false,
            working_dir: None,
            env: HashMap::new(),
            log_format: LogFormat::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON text. Missing fields get defaults.
    pub fn from_json_str(json: &str) -> Result<Self, StageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading pipeline config");
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Loads defaults or `path`, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, StageError> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Applies `STAGETREE_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), StageError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), StageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_STAGE_TIMEOUT_MS) {
            self.stage_timeout_ms = parse_ms(ENV_STAGE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_STEP_TIMEOUT_MS) {
            self.step_timeout_ms = parse_ms(ENV_STEP_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MODE) {
            self.mode = value.parse().map_err(StageError::Config)?;
        }
        if let Some(value) = lookup(ENV_NO_PREFIX) {
            self.no_prefix = parse_flag(ENV_NO_PREFIX, &value)?;
        }
        if let Some(value) = lookup(ENV_NO_REDIRECT) {
            self.no_redirect = parse_flag(ENV_NO_REDIRECT, &value)?;
        }
        if let Some(value) = lookup(ENV_WORKING_DIR) {
            self.working_dir = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            self.log_format = value.parse()?;
        }
        Ok(())
    }

    /// Default stage timeout. Negative values mean none.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        ms_to_duration(self.stage_timeout_ms)
    }

    /// Default per-step timeout. Negative values mean none.
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        ms_to_duration(self.step_timeout_ms)
    }

    /// Sets the default stage timeout.
    #[must_use]
    pub fn with_stage_timeout_ms(mut self, ms: i64) -> Self {
        self.stage_timeout_ms = ms;
        self
    }

    /// Sets the default step timeout.
    #[must_use]
    pub fn with_step_timeout_ms(mut self, ms: i64) -> Self {
        self.step_timeout_ms = ms;
        self
    }

    /// Sets the run mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Adds a global environment entry.
    #[must_use]
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

fn ms_to_duration(ms: i64) -> Option<Duration> {
    u64::try_from(ms).ok().map(Duration::from_millis)
}

fn parse_ms(key: &str, value: &str) -> Result<i64, StageError> {
    value
        .trim()
        .parse()
        .map_err(|_| StageError::config(format!("{key}: '{value}' is not a number of milliseconds")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, StageError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(StageError::config(format!("{key}: '{value}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.stage_timeout(), None);
        assert_eq!(config.step_timeout(), None);
        assert_eq!(config.mode, RunMode::Execute);
        assert!(!config.no_prefix);
    }

    #[test]
    fn test_partial_json_gets_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{"step_timeout_ms": 1500, "mode": "verify"}"#).unwrap();

        assert_eq!(config.step_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.stage_timeout_ms, -1);
        assert_eq!(config.mode, RunMode::Verify);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"no_redirect": true, "env": {{"CI": "1"}}}}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();

        assert!(config.no_redirect);
        assert_eq!(config.env.get("CI").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, StageError::Io(_)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = PipelineConfig::new().with_stage_timeout_ms(10_000);
        config
            .apply_vars(vars(&[
                (ENV_STAGE_TIMEOUT_MS, "2500"),
                (ENV_MODE, "verify"),
                (ENV_NO_PREFIX, "yes"),
                (ENV_WORKING_DIR, "/tmp/work"),
                (ENV_LOG_FORMAT, "json"),
            ]))
            .unwrap();

        assert_eq!(config.stage_timeout_ms, 2500);
        assert_eq!(config.mode, RunMode::Verify);
        assert!(config.no_prefix);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp/work")));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_bad_env_values_are_config_errors() {
        let mut config = PipelineConfig::new();
        let err = config
            .apply_vars(vars(&[(ENV_STEP_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, StageError::Config(_)));

        let err = config
            .apply_vars(vars(&[(ENV_NO_REDIRECT, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_NO_REDIRECT));
    }

    #[test]
    fn test_negative_timeout_means_none() {
        let config = PipelineConfig::new().with_step_timeout_ms(-5);
        assert_eq!(config.step_timeout(), None);
    }
}
