//! A single step execution unit.

use crate::actions::{ActionOutput, CancelScope, LeafAction, StepContext};
use crate::cancellation::{CancelSignal, StageSignals};
use crate::context::{StageContext, StageIndex, StageParent, Step};
use crate::errors::{StageError, StepException};
use crate::observability::SpanTimer;
use crate::outcome::Outcome;
use crate::report::{step_prefix, Reporter, RunEvent};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// What one step contributed to its stage.
#[derive(Debug)]
pub(super) struct StepReport {
    pub(super) success: bool,
    pub(super) exceptions: Vec<StepException>,
    pub(super) stage_soft_cancelled: bool,
}

impl StepReport {
    fn succeeded() -> Self {
        Self {
            success: true,
            exceptions: Vec::new(),
            stage_soft_cancelled: false,
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            exceptions: Vec::new(),
            stage_soft_cancelled: false,
        }
    }

    fn stage_soft_cancelled() -> Self {
        Self {
            success: true,
            exceptions: Vec::new(),
            stage_soft_cancelled: true,
        }
    }

    fn from_outcome(outcome: Outcome) -> Self {
        Self {
            success: outcome.success,
            exceptions: outcome.exceptions,
            stage_soft_cancelled: false,
        }
    }

    /// Failures and stage soft-cancels both stop un-started siblings.
    fn stops_siblings(&self) -> bool {
        !self.success || self.stage_soft_cancelled
    }
}

/// Everything needed to run one step on its own task.
pub(super) struct StepUnit {
    stage: StageContext,
    index: usize,
    step: Step,
    signals: StageSignals,
    reporter: Arc<dyn Reporter>,
}

impl StepUnit {
    pub(super) fn new(
        stage: &StageContext,
        index: usize,
        signals: &StageSignals,
        reporter: &Arc<dyn Reporter>,
    ) -> Self {
        Self {
            stage: stage.clone(),
            index,
            step: stage.steps()[index].clone(),
            signals: signals.clone(),
            reporter: Arc::clone(reporter),
        }
    }

    /// Runs the step. Only a fatal error from a nested stage escapes.
    pub(super) async fn execute(self) -> Result<StepReport, StageError> {
        let prefix = step_prefix(&self.stage.name_path(), self.index);
        let is_parallel = self.stage.is_parallel();
        self.reporter.report(&RunEvent::StepStarted {
            prefix: prefix.clone(),
            is_parallel,
        });

        let timer = SpanTimer::start(&prefix);
        // Fresh per step so the step deadline counts from here.
        let signal = self.signals.step_signal();

        let report = match &self.step {
            Step::Action(action) => self.run_action(action.as_ref(), signal, &prefix).await,
            Step::Stage(child) => {
                let attached =
                    child.with_parent(StageParent::Stage(Arc::new(self.stage.clone())));
                let outcome = super::run(attached, StageIndex::Step(self.index), signal).await?;
                StepReport::from_outcome(outcome)
            }
        };

        if report.stops_siblings() {
            self.signals.trigger_step_error();
        }

        self.reporter.report(&RunEvent::StepFinished {
            prefix,
            is_parallel,
            elapsed_ms: timer.elapsed_ms(),
        });
        Ok(report)
    }

    async fn run_action(
        &self,
        action: &dyn LeafAction,
        signal: CancelSignal,
        prefix: &str,
    ) -> StepReport {
        let ctx = StepContext::new(self.stage.clone(), self.index, signal);
        debug!(prefix, action = action.name(), "running action");

        match AssertUnwindSafe(action.run(&ctx)).catch_unwind().await {
            Ok(Ok(ActionOutput::Success)) => StepReport::succeeded(),
            Ok(Ok(ActionOutput::Failed(message))) => {
                if !message.is_empty() {
                    self.reporter.report(&RunEvent::StepError {
                        prefix: prefix.to_string(),
                        message,
                        no_prefix: self.stage.effective_no_prefix(),
                    });
                }
                StepReport::failed()
            }
            Ok(Ok(ActionOutput::SoftCancel(CancelScope::Step))) => {
                debug!(prefix, "step soft-cancelled");
                StepReport::succeeded()
            }
            Ok(Ok(ActionOutput::SoftCancel(CancelScope::Stage))) => {
                debug!(prefix, "stage soft-cancelled");
                StepReport::stage_soft_cancelled()
            }
            Ok(Err(error)) => self.exception(error),
            Err(payload) => self.exception(anyhow::anyhow!(
                "step panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    fn exception(&self, error: anyhow::Error) -> StepReport {
        let exception = StepException::new(self.stage.name_path(), self.index, error);
        warn!(%exception, "step raised an exception");
        self.reporter.report(&RunEvent::ExceptionRaised {
            exception: exception.clone(),
        });
        StepReport {
            success: false,
            exceptions: vec![exception],
            stage_soft_cancelled: false,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
