//! A leaf action that waits.

use super::{ActionOutput, LeafAction, StepContext};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Waits for a fixed duration, giving up when the step signal fires.
#[derive(Debug, Clone)]
pub struct SleepAction {
    name: String,
    duration: Duration,
}

impl SleepAction {
    /// Creates a new sleep action.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            name: format!("sleep {}ms", duration.as_millis()),
            duration,
        }
    }
}

#[async_trait]
impl LeafAction for SleepAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<ActionOutput> {
        let slept = ctx
            .signal()
            .run_until_cancelled(tokio::time::sleep(self.duration))
            .await;

        if slept.is_some() {
            return Ok(ActionOutput::Success);
        }

        let reason = if ctx.signal().is_timed_out() {
            "timed out"
        } else {
            "cancelled"
        };
        debug!(prefix = %ctx.prefix(), reason, "sleep interrupted");
        Ok(ActionOutput::failed(format!("{} {reason}", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancelSignal;
    use crate::context::StageContext;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let ctx = StepContext::new(StageContext::builder("s").build(), 0, CancelSignal::new());
        let output = SleepAction::new(Duration::from_millis(50)).run(&ctx).await.unwrap();
        assert_eq!(output, ActionOutput::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_times_out() {
        let signal = CancelSignal::new().child(Some(Duration::from_millis(10)));
        let ctx = StepContext::new(StageContext::builder("s").build(), 0, signal);
        let output = SleepAction::new(Duration::from_secs(60)).run(&ctx).await.unwrap();
        assert_eq!(output, ActionOutput::failed("sleep 60000ms timed out"));
    }
}
