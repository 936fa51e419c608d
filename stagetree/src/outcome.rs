//! Stage outcomes and exit-code policy.

use crate::actions::ActionOutput;
use crate::context::{StageContext, StageParent};
use crate::errors::StepException;
use serde::Serialize;
use tracing::debug;

/// Failure message for an unacceptable exit code.
pub const NON_ZERO_EXIT_CODE: &str = "Non-zero exit code";

/// Result of running a stage.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Whether the stage counts as succeeded.
    pub success: bool,
    /// Exceptions raised by steps, in aggregation order.
    pub exceptions: Vec<StepException>,
}

impl Outcome {
    /// A successful outcome with no exceptions.
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            exceptions: Vec::new(),
        }
    }

    /// Folds a child outcome into this one: success is ANDed and exceptions
    /// are appended.
    pub fn merge(&mut self, other: Self) {
        self.success &= other.success;
        self.exceptions.extend(other.exceptions);
    }

    /// Returns true if any exception was recorded.
    #[must_use]
    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }
}

impl StageContext {
    /// Returns true if `code` is acceptable for this stage.
    ///
    /// Only this stage's own codes and its immediate parent stage's codes are
    /// consulted. Grandparents are not.
    #[must_use]
    pub fn is_acceptable_exit_code(&self, code: i32) -> bool {
        if self.exit_codes().contains(&code) {
            return true;
        }
        match self.parent() {
            Some(StageParent::Stage(parent)) => parent.exit_codes().contains(&code),
            Some(StageParent::Pipeline(_)) | None => false,
        }
    }

    /// Maps a process or activity exit code to a step result.
    #[must_use]
    pub fn map_exit_code_to_result(&self, code: i32) -> ActionOutput {
        if self.is_acceptable_exit_code(code) {
            ActionOutput::Success
        } else {
            debug!(stage = %self.name_path(), code, "unacceptable exit code");
            ActionOutput::failed(NON_ZERO_EXIT_CODE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn attach(child: &StageContext, parent: &StageContext) -> StageContext {
        child.with_parent(StageParent::Stage(Arc::new(parent.clone())))
    }

    #[test]
    fn test_merge_ands_success_and_appends() {
        let mut outcome = Outcome::success();
        outcome.merge(Outcome {
            success: false,
            exceptions: vec![StepException::new("a", 0, anyhow::anyhow!("x"))],
        });
        outcome.merge(Outcome::success());

        assert!(!outcome.success);
        assert!(outcome.has_exceptions());
        assert_eq!(outcome.exceptions.len(), 1);
    }

    #[test]
    fn test_default_exit_codes() {
        let stage = StageContext::builder("s").build();
        assert!(stage.is_acceptable_exit_code(0));
        assert!(!stage.is_acceptable_exit_code(1));
        assert_eq!(stage.map_exit_code_to_result(0), ActionOutput::Success);
        assert_eq!(
            stage.map_exit_code_to_result(2),
            ActionOutput::failed(NON_ZERO_EXIT_CODE)
        );
    }

    #[test]
    fn test_exit_code_from_direct_parent() {
        let parent = StageContext::builder("p").accept_exit_code(1).build();
        let child = attach(&StageContext::builder("c").build(), &parent);
        assert!(child.is_acceptable_exit_code(1));
    }

    #[test]
    fn test_exit_code_from_grandparent_ignored() {
        let grandparent = StageContext::builder("g").accept_exit_code(1).build();
        let parent = attach(&StageContext::builder("p").build(), &grandparent);
        let child = attach(&StageContext::builder("c").build(), &parent);

        assert!(parent.is_acceptable_exit_code(1));
        assert!(!child.is_acceptable_exit_code(1));
    }
}
