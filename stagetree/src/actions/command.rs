//! A leaf action wrapping an external process.

use super::{ActionOutput, LeafAction, StepContext};
use anyhow::Context as _;
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs an external process in the stage's working directory.
///
/// Stage environment overrides are applied on top of the inherited process
/// environment. The exit code is mapped through the stage's acceptable exit
/// codes. Output is captured and traced line by line unless the stage
/// suppresses redirection, in which case the child inherits stdio.
#[derive(Debug, Clone)]
pub struct CommandAction {
    name: String,
    program: OsString,
    args: Vec<OsString>,
}

impl CommandAction {
    /// Creates a new command action.
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let program = program.into();
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let name = std::iter::once(&program)
            .chain(args.iter())
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            name,
            program,
            args,
        }
    }

    fn command(&self, ctx: &StepContext, no_redirect: bool) -> Command {
        let stage = ctx.stage();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(stage.env_overrides())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = stage.working_dir() {
            cmd.current_dir(dir);
        }

        if no_redirect {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        cmd
    }
}

#[async_trait]
impl LeafAction for CommandAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<ActionOutput> {
        let no_redirect = ctx.stage().effective_no_redirect();
        let prefix = ctx.prefix();

        debug!(prefix = %prefix, command = %self.name, "spawning process");
        let child = self
            .command(ctx, no_redirect)
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.name))?;

        // Dropping the wait future on cancellation kills the child.
        let Some(output) = ctx
            .signal()
            .run_until_cancelled(child.wait_with_output())
            .await
        else {
            let reason = if ctx.signal().is_timed_out() {
                "timed out"
            } else {
                "cancelled"
            };
            warn!(prefix = %prefix, command = %self.name, reason, "process killed");
            return Ok(ActionOutput::failed(format!("`{}` {reason}", self.name)));
        };
        let output = output.with_context(|| format!("failed to wait for `{}`", self.name))?;

        if !no_redirect {
            for line in String::from_utf8_lossy(&output.stdout).lines() {
                info!(target: "stagetree::output", prefix = %prefix, "{line}");
            }
            for line in String::from_utf8_lossy(&output.stderr).lines() {
                warn!(target: "stagetree::output", prefix = %prefix, "{line}");
            }
        }

        // A process killed by a signal has no exit code.
        let code = output.status.code().unwrap_or(-1);
        Ok(ctx.stage().map_exit_code_to_result(code))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cancellation::CancelSignal;
    use crate::context::StageContext;
    use std::time::Duration;

    fn ctx_for(stage: StageContext) -> StepContext {
        StepContext::new(stage, 0, CancelSignal::new())
    }

    #[test]
    fn test_command_name() {
        let action = CommandAction::new("cargo", ["build", "--release"]);
        assert_eq!(action.name(), "cargo build --release");
    }

    #[tokio::test]
    async fn test_exit_code_mapping() {
        let ok = CommandAction::new("sh", ["-c", "exit 0"]);
        let bad = CommandAction::new("sh", ["-c", "exit 3"]);
        let stage = StageContext::builder("proc").build();

        assert_eq!(ok.run(&ctx_for(stage.clone())).await.unwrap(), ActionOutput::Success);
        assert!(!bad.run(&ctx_for(stage)).await.unwrap().is_success());

        let tolerant = StageContext::builder("proc").accept_exit_code(3).build();
        assert_eq!(bad.run(&ctx_for(tolerant)).await.unwrap(), ActionOutput::Success);
    }

    #[tokio::test]
    async fn test_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "x").unwrap();

        let stage = StageContext::builder("proc")
            .working_dir(dir.path())
            .env("STAGETREE_TEST_VALUE", "bar")
            .build();
        let action = CommandAction::new(
            "sh",
            ["-c", "test -f marker && test \"$STAGETREE_TEST_VALUE\" = bar"],
        );

        assert_eq!(action.run(&ctx_for(stage)).await.unwrap(), ActionOutput::Success);
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let action = CommandAction::new("definitely-not-a-real-program-xyz", Vec::<String>::new());
        let stage = StageContext::builder("proc").build();
        assert!(action.run(&ctx_for(stage)).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_process_fails() {
        let action = CommandAction::new("sleep", ["30"]);
        let stage = StageContext::builder("proc").build();
        let signal = CancelSignal::new().child(Some(Duration::from_millis(50)));
        let ctx = StepContext::new(stage, 0, signal);

        let output = action.run(&ctx).await.unwrap();
        assert_eq!(output, ActionOutput::failed("`sleep 30` timed out"));
    }
}
