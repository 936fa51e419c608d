//! Reporter trait and implementations.

use super::RunEvent;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn, Level};

/// Receives run events.
///
/// Reporters are called from concurrently running steps and must not block.
#[cfg_attr(test, mockall::automock)]
pub trait Reporter: Send + Sync {
    /// Handles one event.
    fn report(&self, event: &RunEvent);
}

/// A reporter that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl Reporter for NoOpReporter {
    fn report(&self, _event: &RunEvent) {}
}

/// A reporter that renders events through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingReporter {
    /// Level used for lifecycle events. Failures always log at warn/error.
    level: Level,
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingReporter {
    /// Creates a logging reporter with the given lifecycle level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging reporter.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn lifecycle(&self, event_type: &str, message: &str) {
        if self.level == Level::DEBUG {
            debug!(event_type = %event_type, "{message}");
        } else {
            info!(event_type = %event_type, "{message}");
        }
    }
}

impl Reporter for LoggingReporter {
    fn report(&self, event: &RunEvent) {
        let event_type = event.event_type();
        match event {
            RunEvent::StageStarted {
                index,
                name_path,
                stage_timeout_ms,
                step_timeout_ms,
            } => self.lifecycle(
                event_type,
                &format!(
                    "{index} {name_path} started (stage timeout {stage_timeout_ms}ms, step timeout {step_timeout_ms}ms)"
                ),
            ),
            RunEvent::StepStarted { prefix, is_parallel } => {
                debug!(event_type, parallel = is_parallel, "{prefix} started");
            }
            RunEvent::StepFinished {
                prefix,
                is_parallel,
                elapsed_ms,
            } => {
                debug!(event_type, parallel = is_parallel, elapsed_ms, "{prefix} finished");
            }
            RunEvent::StepError {
                prefix,
                message,
                no_prefix,
            } => {
                if *no_prefix {
                    warn!(event_type, "{message}");
                } else {
                    warn!(event_type, "{prefix} {message}");
                }
            }
            RunEvent::StageFinished {
                index,
                name_path,
                success,
                elapsed_ms,
            } => {
                if *success {
                    self.lifecycle(
                        event_type,
                        &format!("{index} {name_path} succeeded in {elapsed_ms}ms"),
                    );
                } else {
                    warn!(event_type, elapsed_ms, "{index} {name_path} failed");
                }
            }
            RunEvent::StageInactive { index, name_path } => {
                self.lifecycle(event_type, &format!("{index} {name_path} inactive"));
            }
            RunEvent::ExceptionRaised { exception } => {
                error!(event_type, "{exception}");
            }
            RunEvent::Cancelled { name_path } => {
                warn!(event_type, "{name_path} cancelled or timed out");
            }
        }
    }
}

/// An event together with the time it was received.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// When the reporter received the event.
    pub at: DateTime<Utc>,
    /// The event.
    pub event: RunEvent,
}

/// A reporter that keeps every event, for tests and post-run inspection.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<RecordedEvent>>,
}

impl CollectingReporter {
    /// Creates a new collecting reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events with their timestamps.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().iter().map(|r| r.event.clone()).collect()
    }

    /// Returns the dotted types of all collected events, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|r| r.event.event_type()).collect()
    }

    /// Returns events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<RunEvent> {
        self.events
            .lock()
            .iter()
            .filter(|r| r.event.event_type().starts_with(type_prefix))
            .map(|r| r.event.clone())
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, event: &RunEvent) {
        self.events.lock().push(RecordedEvent {
            at: Utc::now(),
            event: event.clone(),
        });
    }
}
