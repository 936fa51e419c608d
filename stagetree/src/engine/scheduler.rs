//! Sequential and parallel step scheduling.
//!
//! Both modes fold results through a single [`Aggregate`] owned by the
//! coordinating future, one step at a time, so no locking is needed.

use super::unit::{StepReport, StepUnit};
use crate::cancellation::StageSignals;
use crate::errors::{StageError, StepException};
use crate::outcome::Outcome;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, Instrument};

/// Why scheduling stopped before every unit was folded.
#[derive(Debug)]
pub(super) enum Halt {
    /// The stage-level signal fired before the next unit could start.
    Interrupted,
    /// A unit's task could not be joined.
    Join(JoinError),
    /// A nested stage raised a fatal error.
    Fatal(StageError),
}

/// Running result of a stage.
#[derive(Debug)]
pub(super) struct Aggregate {
    pub(super) success: bool,
    pub(super) exceptions: Vec<StepException>,
    pub(super) stage_soft_cancelled: bool,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            success: true,
            exceptions: Vec::new(),
            stage_soft_cancelled: false,
        }
    }
}

impl Aggregate {
    fn fold(&mut self, report: StepReport) {
        self.success &= report.success;
        self.exceptions.extend(report.exceptions);
        self.stage_soft_cancelled |= report.stage_soft_cancelled;
    }

    pub(super) fn into_outcome(self) -> Outcome {
        Outcome {
            success: self.success,
            exceptions: self.exceptions,
        }
    }
}

/// Starts and awaits units one at a time.
///
/// Stops starting units after the first failure, and before any unit once
/// the stage-level signal has fired.
pub(super) async fn sequential(
    units: Vec<StepUnit>,
    signals: &StageSignals,
    aggregate: &mut Aggregate,
) -> Result<(), Halt> {
    let total = units.len();
    for (started, unit) in units.into_iter().enumerate() {
        if signals.is_cancelled() {
            debug!(skipped = total - started, "stage signal fired, not starting remaining steps");
            return Err(Halt::Interrupted);
        }

        let report = tokio::spawn(unit.execute().in_current_span())
            .await
            .map_err(Halt::Join)?
            .map_err(Halt::Fatal)?;
        aggregate.fold(report);

        if !aggregate.success {
            debug!(skipped = total - started - 1, "step failed, skipping remaining steps");
            break;
        }
    }
    Ok(())
}

/// Starts every unit up front, then folds results in declared order.
///
/// A failing unit raises the step-error flag from its own task as soon as
/// it fails; already running siblings are left alone. If scheduling halts,
/// the tasks not yet joined are aborted.
pub(super) async fn parallel(
    units: Vec<StepUnit>,
    signals: &StageSignals,
    aggregate: &mut Aggregate,
) -> Result<(), Halt> {
    if signals.is_cancelled() {
        return Err(Halt::Interrupted);
    }

    let handles: Vec<JoinHandle<Result<StepReport, StageError>>> = units
        .into_iter()
        .map(|unit| tokio::spawn(unit.execute().in_current_span()))
        .collect();

    let mut pending = handles.into_iter();
    while let Some(handle) = pending.next() {
        let halt = match handle.await {
            Ok(Ok(report)) => {
                aggregate.fold(report);
                continue;
            }
            Ok(Err(fatal)) => Halt::Fatal(fatal),
            Err(join_error) => Halt::Join(join_error),
        };
        let aborted = pending.len();
        for rest in pending {
            rest.abort();
        }
        debug!(aborted, "parallel scheduling halted");
        return Err(halt);
    }
    Ok(())
}
