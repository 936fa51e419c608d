//! Layered signals for a single stage run.

use super::CancelSignal;
use std::time::Duration;

/// The cancellation layers of one stage run.
///
/// * stage level: external ⊕ stage deadline ⊕ step-error flag
/// * step level: stage level ⊕ step deadline
///
/// The step-level signal is what a sub-stage receives as its external
/// signal, so a parent's step timeout bounds the whole nested tree.
#[derive(Debug, Clone)]
pub struct StageSignals {
    external: CancelSignal,
    stage: CancelSignal,
    step_timeout: Option<Duration>,
}

impl StageSignals {
    /// Composes the stage-level signal from the caller's signal.
    #[must_use]
    pub fn compose(
        external: &CancelSignal,
        stage_timeout: Option<Duration>,
        step_timeout: Option<Duration>,
    ) -> Self {
        Self {
            external: external.clone(),
            stage: external.child(stage_timeout),
            step_timeout,
        }
    }

    /// The combined stage-level signal.
    #[must_use]
    pub fn stage(&self) -> &CancelSignal {
        &self.stage
    }

    /// Creates the signal handed to one step, with its deadline starting now.
    #[must_use]
    pub fn step_signal(&self) -> CancelSignal {
        self.stage.child(self.step_timeout)
    }

    /// Raises the step-error flag so no further siblings get started.
    pub fn trigger_step_error(&self) {
        self.stage.trigger();
    }

    /// Returns true if the caller's own signal fired.
    #[must_use]
    pub fn external_cancelled(&self) -> bool {
        self.external.is_cancelled()
    }

    /// Returns true if any stage-level layer fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.stage.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_does_not_reach_external() {
        let external = CancelSignal::new();
        let signals = StageSignals::compose(&external, None, None);
        let step = signals.step_signal();

        signals.trigger_step_error();

        assert!(signals.is_cancelled());
        assert!(step.is_cancelled());
        assert!(!signals.external_cancelled());
        assert!(!external.is_cancelled());
    }

    #[test]
    fn test_external_reaches_every_layer() {
        let external = CancelSignal::new();
        let signals = StageSignals::compose(&external, None, None);
        let step = signals.step_signal();

        external.trigger();

        assert!(signals.external_cancelled());
        assert!(signals.is_cancelled());
        assert!(step.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_deadline_bounded_by_stage_deadline() {
        let external = CancelSignal::new();
        let signals = StageSignals::compose(
            &external,
            Some(Duration::from_millis(100)),
            Some(Duration::from_secs(5)),
        );
        let step = signals.step_signal();
        assert_eq!(step.deadline(), signals.stage().deadline());

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(step.is_timed_out());
        assert!(signals.is_cancelled());
        assert!(!signals.external_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_does_not_cancel_stage() {
        let external = CancelSignal::new();
        let signals =
            StageSignals::compose(&external, None, Some(Duration::from_millis(10)));
        let step = signals.step_signal();

        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(step.is_cancelled());
        assert!(!signals.is_cancelled());
    }
}
