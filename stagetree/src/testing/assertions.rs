//! Test assertions for stage outcomes.

use crate::outcome::Outcome;
use crate::report::{CollectingReporter, RunEvent};

/// Asserts that the outcome indicates success.
pub fn assert_outcome_succeeded(outcome: &Outcome) {
    assert!(
        outcome.success,
        "Expected success, got failure with {} exception(s)",
        outcome.exceptions.len()
    );
}

/// Asserts that the outcome indicates failure.
pub fn assert_outcome_failed(outcome: &Outcome) {
    assert!(!outcome.success, "Expected failure, got success");
}

/// Asserts the number of recorded exceptions.
pub fn assert_exception_count(outcome: &Outcome, expected: usize) {
    assert_eq!(
        outcome.exceptions.len(),
        expected,
        "Expected {} exception(s), got {:?}",
        expected,
        outcome
            .exceptions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    );
}

/// Asserts that a step error with exactly `message` was reported.
pub fn assert_step_error_reported(reporter: &CollectingReporter, message: &str) {
    let messages: Vec<String> = reporter
        .events()
        .into_iter()
        .filter_map(|event| match event {
            RunEvent::StepError { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    assert!(
        messages.iter().any(|m| m == message),
        "Expected step error '{message}', got {messages:?}"
    );
}

/// Asserts that a cancellation was reported for `name_path`.
pub fn assert_cancelled_reported(reporter: &CollectingReporter, name_path: &str) {
    let cancelled = reporter
        .events()
        .into_iter()
        .any(|event| matches!(event, RunEvent::Cancelled { name_path: p } if p == name_path));
    assert!(
        cancelled,
        "Expected a cancellation of '{name_path}', got {:?}",
        reporter.event_types()
    );
}
