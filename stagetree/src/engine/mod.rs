//! Stage runs: activation, step scheduling and outcome aggregation.
//!
//! [`run`] is the single entry point. It evaluates the stage's activation
//! predicate, composes the stage's cancellation layers, schedules the steps
//! and folds their results. Sub-stages are run through the same function
//! with a parent-attached copy and the step-level signal.

mod scheduler;
mod unit;

use crate::cancellation::{CancelSignal, StageSignals};
use crate::context::{timeout_ms, StageContext, StageIndex};
use crate::errors::StageError;
use crate::observability::SpanTimer;
use crate::outcome::Outcome;
use crate::report::{Reporter, RunEvent};
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::seq::SliceRandom;
use scheduler::{Aggregate, Halt};
use std::sync::Arc;
use tracing::{debug, error, info_span, warn, Instrument};
use unit::StepUnit;

/// Runs a stage and all of its steps.
///
/// Failures of steps and sub-stages are folded into the returned
/// [`Outcome`]. The only error is [`StageError::StageIgnored`], raised when
/// an inactive stage is marked as required; it aborts every ancestor.
pub fn run(
    stage: StageContext,
    index: StageIndex,
    signal: CancelSignal,
) -> BoxFuture<'static, Result<Outcome, StageError>> {
    run_stage(stage, index, signal).boxed()
}

async fn run_stage(
    stage: StageContext,
    index: StageIndex,
    external: CancelSignal,
) -> Result<Outcome, StageError> {
    let reporter = stage.reporter();
    let name_path = stage.name_path();

    if !stage.is_active() {
        if stage.fail_if_ignored() {
            // Re-evaluated only so the predicate can explain itself.
            let _ = stage.verifying().is_active();
            error!(stage = %name_path, "required stage is inactive");
            return Err(StageError::stage_ignored(name_path));
        }
        debug!(stage = %name_path, "stage inactive");
        reporter.report(&RunEvent::StageInactive { index, name_path });
        return Ok(Outcome::success());
    }

    let span = info_span!("stage", path = %name_path, %index);
    run_active(stage, index, external, reporter, name_path)
        .instrument(span)
        .await
}

async fn run_active(
    stage: StageContext,
    index: StageIndex,
    external: CancelSignal,
    reporter: Arc<dyn Reporter>,
    name_path: String,
) -> Result<Outcome, StageError> {
    let stage_timeout = stage.effective_stage_timeout();
    let step_timeout = stage.effective_step_timeout();
    reporter.report(&RunEvent::StageStarted {
        index,
        name_path: name_path.clone(),
        stage_timeout_ms: timeout_ms(stage_timeout),
        step_timeout_ms: timeout_ms(step_timeout),
    });

    let timer = SpanTimer::start(&name_path);
    let signals = StageSignals::compose(&external, stage_timeout, step_timeout);
    let units: Vec<StepUnit> = step_order(&stage)
        .into_iter()
        .map(|i| StepUnit::new(&stage, i, &signals, &reporter))
        .collect();

    let mut aggregate = Aggregate::default();
    let scheduled = if stage.is_parallel() {
        scheduler::parallel(units, &signals, &mut aggregate).await
    } else {
        scheduler::sequential(units, &signals, &mut aggregate).await
    };

    match scheduled {
        Ok(()) => {}
        Err(Halt::Fatal(err)) => return Err(err),
        Err(halt) => {
            if let Halt::Join(join_error) = &halt {
                warn!(error = %join_error, "step task could not be joined");
            }
            if !aggregate.stage_soft_cancelled {
                aggregate.success = false;
                if signals.is_cancelled() {
                    debug!(external = signals.external_cancelled(), "stage interrupted");
                    reporter.report(&RunEvent::Cancelled {
                        name_path: name_path.clone(),
                    });
                } else {
                    reporter.report(&RunEvent::StepError {
                        prefix: name_path.clone(),
                        message: "step failed".to_string(),
                        no_prefix: stage.effective_no_prefix(),
                    });
                }
            }
        }
    }

    // Siblings interrupted by a stage soft-cancel may have failed; the
    // stage itself still succeeds.
    if aggregate.stage_soft_cancelled {
        debug!("stage soft-cancelled, remaining steps skipped");
        aggregate.success = true;
    }

    let outcome = aggregate.into_outcome();
    reporter.report(&RunEvent::StageFinished {
        index,
        name_path,
        success: outcome.success,
        elapsed_ms: timer.elapsed_ms(),
    });
    Ok(outcome)
}

/// Declared order, or a fresh permutation for shuffled stages.
fn step_order(stage: &StageContext) -> Vec<usize> {
    let mut order: Vec<usize> = (0..stage.steps().len()).collect();
    if stage.is_shuffled() {
        order.shuffle(&mut rand::thread_rng());
    }
    order
}
