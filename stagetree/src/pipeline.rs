//! The pipeline runner: top-level stages in order.

use crate::cancellation::CancelSignal;
use crate::config::PipelineConfig;
use crate::context::{PipelineContext, RunMode, StageContext, StageIndex, StageParent, Step};
use crate::engine;
use crate::errors::{StageError, StepException};
use crate::observability::SpanTimer;
use crate::outcome::Outcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Overall success.
    pub success: bool,
    /// Every exception recorded by any step.
    pub exceptions: Vec<StepException>,
    /// Number of top-level stages that were run.
    pub stages_run: usize,
    /// Wall time of the whole run.
    pub elapsed_ms: u64,
    /// Activation checks, filled in verify mode only.
    pub checks: Vec<StageCheck>,
}

impl PipelineOutcome {
    /// Process exit status for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success)
    }
}

/// Activation of one stage as seen by a verify run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCheck {
    /// Full name path.
    pub name_path: String,
    /// Whether the stage would run.
    pub active: bool,
}

/// A list of top-level stages sharing one root context.
#[derive(Debug)]
pub struct Pipeline {
    context: Arc<PipelineContext>,
    stages: Vec<StageContext>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(context: PipelineContext) -> Self {
        Self {
            context: Arc::new(context),
            stages: Vec::new(),
        }
    }

    /// Creates an empty pipeline from loaded configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig, args: Vec<String>) -> Self {
        Self::new(PipelineContext::from_config(config, args))
    }

    /// Appends a top-level stage.
    #[must_use]
    pub fn stage(mut self, stage: StageContext) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a top-level stage in place.
    pub fn add_stage(&mut self, stage: StageContext) {
        self.stages.push(stage);
    }

    /// The root context.
    #[must_use]
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// The top-level stages in run order.
    #[must_use]
    pub fn stages(&self) -> &[StageContext] {
        &self.stages
    }

    fn attached(&self, stage: &StageContext) -> StageContext {
        stage.with_parent(StageParent::Pipeline(Arc::clone(&self.context)))
    }

    /// Runs the pipeline.
    ///
    /// Stops after the first unsuccessful stage. In verify mode no step is
    /// executed; see [`Pipeline::verify`].
    pub async fn run(&self, signal: CancelSignal) -> Result<PipelineOutcome, StageError> {
        let run_id = Uuid::now_v7();
        let span = info_span!("pipeline", %run_id, mode = %self.context.mode());
        self.run_inner(run_id, signal).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        signal: CancelSignal,
    ) -> Result<PipelineOutcome, StageError> {
        let started_at = Utc::now();
        let timer = SpanTimer::start(run_id.to_string());
        let mut outcome = PipelineOutcome {
            run_id,
            started_at,
            success: true,
            exceptions: Vec::new(),
            stages_run: 0,
            elapsed_ms: 0,
            checks: Vec::new(),
        };

        if self.context.mode() == RunMode::Verify {
            outcome.checks = self.verify()?;
            outcome.elapsed_ms = timer.finish();
            info!(checks = outcome.checks.len(), "pipeline verified");
            return Ok(outcome);
        }

        info!(stages = self.stages.len(), "pipeline started");
        let mut total = Outcome::success();
        for (i, stage) in self.stages.iter().enumerate() {
            let result = engine::run(self.attached(stage), StageIndex::Stage(i), signal.clone()).await?;
            outcome.stages_run += 1;
            let stage_ok = result.success;
            total.merge(result);
            if !stage_ok {
                warn!(stage = stage.name(), "stage failed, stopping pipeline");
                break;
            }
        }

        let has_exceptions = total.has_exceptions();
        outcome.success = total.success;
        outcome.exceptions = total.exceptions;
        outcome.elapsed_ms = timer.finish();
        info!(
            success = outcome.success,
            has_exceptions,
            stages_run = outcome.stages_run,
            elapsed_ms = outcome.elapsed_ms,
            "pipeline finished"
        );
        Ok(outcome)
    }

    /// Evaluates every activation predicate in verification mode.
    ///
    /// Sub-stages of inactive stages are not visited. A required stage that
    /// is inactive fails the check exactly as it would fail a real run.
    pub fn verify(&self) -> Result<Vec<StageCheck>, StageError> {
        let mut checks = Vec::new();
        for stage in &self.stages {
            verify_tree(&self.attached(stage), &mut checks)?;
        }
        Ok(checks)
    }
}

fn verify_tree(stage: &StageContext, checks: &mut Vec<StageCheck>) -> Result<(), StageError> {
    let verifying = stage.verifying();
    let active = verifying.is_active();
    let name_path = stage.name_path();
    if !active && stage.fail_if_ignored() {
        return Err(StageError::stage_ignored(name_path));
    }
    checks.push(StageCheck { name_path, active });
    if !active {
        return Ok(());
    }

    let parent = StageParent::Stage(Arc::new(stage.clone()));
    for step in stage.steps() {
        if let Step::Stage(child) = step {
            verify_tree(&child.with_parent(parent.clone()), checks)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionOutput, StepContext};
    use crate::conditions;
    use crate::report::CollectingReporter;
    use crate::testing::{ErrorAction, ExecutionLog, RecordingAction};
    use pretty_assertions::assert_eq;

    fn quiet_context() -> PipelineContext {
        PipelineContext::new().with_reporter(Arc::new(CollectingReporter::new()))
    }

    #[tokio::test]
    async fn test_runs_stages_in_order() {
        let log = ExecutionLog::new();
        let pipeline = Pipeline::new(quiet_context())
            .stage(StageContext::builder("one").action(RecordingAction::new("a", &log)).build())
            .stage(StageContext::builder("two").action(RecordingAction::new("b", &log)).build());

        let outcome = pipeline.run(CancelSignal::new()).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.stages_run, 2);
        assert_eq!(log.started(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_stops_at_first_failed_stage() {
        let log = ExecutionLog::new();
        let pipeline = Pipeline::new(quiet_context())
            .stage(StageContext::builder("broken").action(ErrorAction::new("e", "nope")).build())
            .stage(StageContext::builder("later").action(RecordingAction::new("b", &log)).build());

        let outcome = pipeline.run(CancelSignal::new()).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.stages_run, 1);
        assert_eq!(outcome.exceptions.len(), 1);
        assert!(!log.was_started("b"));
    }

    #[tokio::test]
    async fn test_fatal_stage_aborts_pipeline() {
        let pipeline = Pipeline::new(quiet_context()).stage(
            StageContext::builder("required")
                .condition(conditions::never())
                .fail_if_ignored()
                .build(),
        );

        let err = pipeline.run(CancelSignal::new()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_stages_see_pipeline_args() {
        let pipeline = Pipeline::new(quiet_context().with_args(["--target", "x86"])).stage(
            StageContext::builder("args")
                .run("check", |ctx: StepContext| async move {
                    Ok(ActionOutput::from_result(
                        (ctx.stage().try_cmd_arg("--target") == Some("x86"))
                            .then_some(())
                            .ok_or_else(|| "missing --target".to_string()),
                    ))
                })
                .build(),
        );

        let outcome = pipeline.run(CancelSignal::new()).await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_verify_mode_runs_no_steps() {
        let log = ExecutionLog::new();
        let child = StageContext::builder("child")
            .condition(conditions::when_env_var("NIGHTLY"))
            .stage(StageContext::builder("never-visited").build())
            .build();
        let pipeline = Pipeline::new(quiet_context().with_mode(RunMode::Verify)).stage(
            StageContext::builder("root")
                .action(RecordingAction::new("a", &log))
                .stage(child)
                .build(),
        );

        let outcome = pipeline.run(CancelSignal::new()).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.stages_run, 0);
        assert!(log.started().is_empty());
        assert_eq!(
            outcome.checks,
            vec![
                StageCheck { name_path: "root".to_string(), active: true },
                StageCheck { name_path: "root/child".to_string(), active: false },
            ]
        );
    }

    #[test]
    fn test_verify_reports_required_inactive_stage() {
        let pipeline = Pipeline::new(quiet_context()).stage(
            StageContext::builder("root")
                .stage(
                    StageContext::builder("gate")
                        .condition(conditions::never())
                        .fail_if_ignored()
                        .build(),
                )
                .build(),
        );

        let err = pipeline.verify().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Stage 'root/gate' is inactive but must not be ignored"
        );
    }

    #[tokio::test]
    async fn test_outcome_serializes() {
        let pipeline = Pipeline::new(quiet_context())
            .stage(StageContext::builder("broken").action(ErrorAction::new("e", "nope")).build());

        let outcome = pipeline.run(CancelSignal::new()).await.unwrap();
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["exceptions"][0]["name_path"], "broken");
        assert_eq!(json["exceptions"][0]["message"], "nope");
    }
}
