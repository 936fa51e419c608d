//! Error types for the stagetree engine.
//!
//! Only [`StageError::StageIgnored`] ever escapes a stage run. Everything a
//! step does wrong is folded into the run's [`Outcome`](crate::outcome::Outcome)
//! as a [`StepException`] instead.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The main error type for stagetree operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// An inactive stage was marked as required.
    ///
    /// This is the only unrecoverable run-time failure: it unwinds through
    /// every ancestor stage and aborts the pipeline.
    #[error("Stage '{name_path}' is inactive but must not be ignored")]
    StageIgnored {
        /// Full name path of the ignored stage.
        name_path: String,
    },

    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tracing subscriber could not be installed.
    #[error("Logging setup error: {0}")]
    Logging(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// Creates a stage-ignored error.
    #[must_use]
    pub fn stage_ignored(name_path: impl Into<String>) -> Self {
        Self::StageIgnored {
            name_path: name_path.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error must abort the whole pipeline.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StageIgnored { .. })
    }
}

/// An exception raised while executing a single step.
///
/// Cloning is cheap; the underlying error is shared.
#[derive(Debug, Clone)]
pub struct StepException {
    name_path: String,
    step: usize,
    error: Arc<anyhow::Error>,
}

impl StepException {
    /// Creates a new step exception.
    #[must_use]
    pub fn new(name_path: impl Into<String>, step: usize, error: anyhow::Error) -> Self {
        Self {
            name_path: name_path.into(),
            step,
            error: Arc::new(error),
        }
    }

    /// Name path of the stage the step belongs to.
    #[must_use]
    pub fn name_path(&self) -> &str {
        &self.name_path
    }

    /// Declared index of the step within its stage.
    #[must_use]
    pub fn step(&self) -> usize {
        self.step
    }

    /// The underlying error.
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }
}

impl fmt::Display for StepException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {:#}", self.name_path, self.step, self.error)
    }
}

/// Two exceptions are equal when they come from the same step with the same
/// rendered message.
impl PartialEq for StepException {
    fn eq(&self, other: &Self) -> bool {
        self.name_path == other.name_path
            && self.step == other.step
            && format!("{:#}", self.error) == format!("{:#}", other.error)
    }
}

impl std::error::Error for StepException {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&**self.error)
    }
}

impl Serialize for StepException {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StepException", 3)?;
        state.serialize_field("name_path", &self.name_path)?;
        state.serialize_field("step", &self.step)?;
        state.serialize_field("message", &format!("{:#}", self.error))?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ignored_is_fatal() {
        let err = StageError::stage_ignored("build/deploy");
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Stage 'build/deploy' is inactive but must not be ignored"
        );
    }

    #[test]
    fn test_config_error_not_fatal() {
        let err = StageError::config("bad timeout");
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Configuration error: bad timeout");
    }

    #[test]
    fn test_step_exception_display() {
        let exc = StepException::new("ci/test", 2, anyhow::anyhow!("boom"));
        assert_eq!(exc.to_string(), "ci/test[2]: boom");
        assert_eq!(exc.step(), 2);
        assert_eq!(exc.name_path(), "ci/test");
    }

    #[test]
    fn test_step_exception_serialize() {
        let exc = StepException::new("ci", 0, anyhow::anyhow!("broken pipe"));
        let json = serde_json::to_value(&exc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name_path": "ci", "step": 0, "message": "broken pipe"})
        );
    }
}
