//! Scripted leaf actions for testing stage trees.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::{ActionOutput, CancelScope, LeafAction, StepContext};

/// Shared, ordered log of step starts and finishes.
///
/// Clones share the same log, so one log can be handed to every action of a
/// tree.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    started: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&self, label: &str) {
        self.started.lock().push(label.to_string());
    }

    fn finish(&self, label: &str) {
        self.finished.lock().push(label.to_string());
    }

    /// Labels in the order their actions started.
    #[must_use]
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    /// Labels in the order their actions ran to completion.
    #[must_use]
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    /// Returns true if the labelled action started.
    #[must_use]
    pub fn was_started(&self, label: &str) -> bool {
        self.started.lock().iter().any(|l| l == label)
    }

    /// Returns true if the labelled action ran to completion.
    #[must_use]
    pub fn was_finished(&self, label: &str) -> bool {
        self.finished.lock().iter().any(|l| l == label)
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.started.lock().clear();
        self.finished.lock().clear();
    }
}

/// An action that records itself, optionally waits, then returns a fixed
/// output.
///
/// The wait observes the step signal. An interrupted wait fails the step
/// with `"<label> interrupted"` and is not logged as finished.
#[derive(Debug, Clone)]
pub struct RecordingAction {
    label: String,
    output: ActionOutput,
    delay: Option<Duration>,
    log: ExecutionLog,
}

impl RecordingAction {
    /// Creates a succeeding action.
    #[must_use]
    pub fn new(label: impl Into<String>, log: &ExecutionLog) -> Self {
        Self {
            label: label.into(),
            output: ActionOutput::Success,
            delay: None,
            log: log.clone(),
        }
    }

    /// Creates an action that fails with `message`.
    #[must_use]
    pub fn failing(label: impl Into<String>, message: impl Into<String>, log: &ExecutionLog) -> Self {
        Self::new(label, log).with_output(ActionOutput::failed(message))
    }

    /// Creates an action that soft-cancels `scope`.
    #[must_use]
    pub fn soft_cancel(label: impl Into<String>, scope: CancelScope, log: &ExecutionLog) -> Self {
        Self::new(label, log).with_output(ActionOutput::SoftCancel(scope))
    }

    /// Sets the output to return.
    #[must_use]
    pub fn with_output(mut self, output: ActionOutput) -> Self {
        self.output = output;
        self
    }

    /// Waits before returning.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Waits `ms` milliseconds before returning.
    #[must_use]
    pub fn with_delay_ms(self, ms: u64) -> Self {
        self.with_delay(Duration::from_millis(ms))
    }
}

#[async_trait]
impl LeafAction for RecordingAction {
    fn name(&self) -> &str {
        &self.label
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<ActionOutput> {
        self.log.start(&self.label);
        if let Some(delay) = self.delay {
            let waited = ctx
                .signal()
                .run_until_cancelled(tokio::time::sleep(delay))
                .await;
            if waited.is_none() {
                return Ok(ActionOutput::failed(format!("{} interrupted", self.label)));
            }
        }
        self.log.finish(&self.label);
        Ok(self.output.clone())
    }
}

/// An action that returns an error, i.e. raises an unhandled exception.
#[derive(Debug)]
pub struct ErrorAction {
    name: String,
    message: String,
}

impl ErrorAction {
    /// Creates a new erroring action.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl LeafAction for ErrorAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &StepContext) -> anyhow::Result<ActionOutput> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// An action that panics.
#[derive(Debug)]
pub struct PanicAction {
    name: String,
}

impl PanicAction {
    /// Creates a new panicking action.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl LeafAction for PanicAction {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::panic)]
    async fn run(&self, _ctx: &StepContext) -> anyhow::Result<ActionOutput> {
        panic!("{} blew up", self.name)
    }
}

/// An action that captures the context it was run with.
#[derive(Debug, Clone, Default)]
pub struct CaptureAction {
    seen: Arc<Mutex<Vec<StepContext>>>,
}

impl CaptureAction {
    /// Creates a new capturing action.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every context the action was run with.
    #[must_use]
    pub fn seen(&self) -> Vec<StepContext> {
        self.seen.lock().clone()
    }

    /// Returns the most recent context, if the action ran.
    #[must_use]
    pub fn last(&self) -> Option<StepContext> {
        self.seen.lock().last().cloned()
    }
}

#[async_trait]
impl LeafAction for CaptureAction {
    fn name(&self) -> &str {
        "capture"
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<ActionOutput> {
        self.seen.lock().push(ctx.clone());
        Ok(ActionOutput::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancelSignal;
    use crate::context::StageContext;

    fn step_context(signal: CancelSignal) -> StepContext {
        StepContext::new(StageContext::builder("mock").build(), 0, signal)
    }

    #[tokio::test]
    async fn test_recording_action_logs_and_returns_output() {
        let log = ExecutionLog::new();
        let action = RecordingAction::failing("a", "boom", &log);

        let output = action.run(&step_context(CancelSignal::new())).await.unwrap();

        assert_eq!(output, ActionOutput::failed("boom"));
        assert_eq!(log.started(), vec!["a"]);
        assert!(log.was_finished("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_action_interrupted() {
        let log = ExecutionLog::new();
        let action = RecordingAction::new("slow", &log).with_delay_ms(1_000);
        let signal = CancelSignal::new();
        signal.trigger();

        let output = action.run(&step_context(signal)).await.unwrap();

        assert_eq!(output, ActionOutput::failed("slow interrupted"));
        assert!(log.was_started("slow"));
        assert!(!log.was_finished("slow"));
    }

    #[tokio::test]
    async fn test_error_action() {
        let action = ErrorAction::new("err", "kaput");
        let err = action.run(&step_context(CancelSignal::new())).await.unwrap_err();
        assert_eq!(err.to_string(), "kaput");
    }

    #[tokio::test]
    async fn test_capture_action_records_context() {
        let capture = CaptureAction::new();
        capture.run(&step_context(CancelSignal::new())).await.unwrap();
        assert_eq!(capture.seen().len(), 1);
        assert_eq!(capture.last().unwrap().prefix(), "mock[0]");
    }

    #[test]
    fn test_log_clear() {
        let log = ExecutionLog::new();
        log.start("x");
        log.clear();
        assert!(log.started().is_empty());
    }
}
