//! Lifecycle events emitted by a stage run.

use crate::context::StageIndex;
use crate::errors::StepException;
use serde::Serialize;

/// Builds the display prefix of a step.
#[must_use]
pub fn step_prefix(name_path: &str, index: usize) -> String {
    format!("{name_path}[{index}]")
}

/// An event emitted while running a stage tree.
///
/// Events for one stage arrive in order. Events of parallel siblings may
/// interleave.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// An active stage started.
    StageStarted {
        /// Position of the stage.
        index: StageIndex,
        /// Full name path.
        name_path: String,
        /// Effective stage timeout, `-1` for none.
        stage_timeout_ms: i64,
        /// Effective step timeout, `-1` for none.
        step_timeout_ms: i64,
    },
    /// A step started.
    StepStarted {
        /// Step display prefix.
        prefix: String,
        /// Whether the step runs alongside its siblings.
        is_parallel: bool,
    },
    /// A step finished, whatever its result.
    StepFinished {
        /// Step display prefix.
        prefix: String,
        /// Whether the step runs alongside its siblings.
        is_parallel: bool,
        /// Wall time spent in the step.
        elapsed_ms: u64,
    },
    /// A step reported an error message.
    StepError {
        /// Step display prefix.
        prefix: String,
        /// The message.
        message: String,
        /// Whether the prefix should be left out when rendering.
        no_prefix: bool,
    },
    /// An active stage finished.
    StageFinished {
        /// Position of the stage.
        index: StageIndex,
        /// Full name path.
        name_path: String,
        /// Final result.
        success: bool,
        /// Wall time spent in the stage.
        elapsed_ms: u64,
    },
    /// A stage was skipped because its predicate was false.
    StageInactive {
        /// Position of the stage.
        index: StageIndex,
        /// Full name path.
        name_path: String,
    },
    /// A step raised an exception.
    ExceptionRaised {
        /// The exception.
        exception: StepException,
    },
    /// A stage stopped because its cancellation signal fired.
    Cancelled {
        /// Full name path.
        name_path: String,
    },
}

impl RunEvent {
    /// Returns the dotted event type, e.g. `stage.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageStarted { .. } => "stage.started",
            Self::StepStarted { .. } => "step.started",
            Self::StepFinished { .. } => "step.finished",
            Self::StepError { .. } => "step.error",
            Self::StageFinished { .. } => "stage.finished",
            Self::StageInactive { .. } => "stage.inactive",
            Self::ExceptionRaised { .. } => "exception.raised",
            Self::Cancelled { .. } => "stage.cancelled",
        }
    }

    /// Converts the event to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
