//! Ready-made activation predicates.
//!
//! Every predicate stays silent during normal runs. When the stage is being
//! verified, each one logs what it looked at and what it decided.

use crate::context::{Predicate, StageContext};
use std::sync::Arc;
use tracing::warn;

fn explain(stage: &StageContext, condition: &str, active: bool) -> bool {
    if stage.is_verifying() {
        warn!(stage = %stage.name_path(), condition, active, "activation check");
    }
    active
}

/// Always active.
#[must_use]
pub fn always() -> Predicate {
    Arc::new(|stage: &StageContext| explain(stage, "always", true))
}

/// Never active.
#[must_use]
pub fn never() -> Predicate {
    Arc::new(|stage: &StageContext| explain(stage, "never", false))
}

/// Active when the environment variable `key` is set, through stage
/// overrides or the pipeline environment.
#[must_use]
pub fn when_env_var(key: impl Into<String>) -> Predicate {
    let key = key.into();
    Arc::new(move |stage: &StageContext| {
        let active = stage.try_env_var(&key).is_some();
        explain(stage, &format!("env var {key} is set"), active)
    })
}

/// Active when the environment variable `key` equals `value`.
#[must_use]
pub fn when_env_var_equals(key: impl Into<String>, value: impl Into<String>) -> Predicate {
    let key = key.into();
    let value = value.into();
    Arc::new(move |stage: &StageContext| {
        let active = stage.try_env_var(&key) == Some(value.as_str());
        explain(stage, &format!("env var {key} == {value}"), active)
    })
}

/// Active when the command-line token `key` is present.
#[must_use]
pub fn when_cmd_arg(key: impl Into<String>) -> Predicate {
    let key = key.into();
    Arc::new(move |stage: &StageContext| {
        let active = stage.try_cmd_arg(&key).is_some();
        explain(stage, &format!("cmd arg {key} is present"), active)
    })
}

/// Active when `key` is present as a command-line token or set as an
/// environment variable.
#[must_use]
pub fn when_cmd_arg_or_env_var(key: impl Into<String>) -> Predicate {
    let key = key.into();
    Arc::new(move |stage: &StageContext| {
        let active = stage.cmd_arg_or_env_var(&key).is_some();
        explain(stage, &format!("cmd arg or env var {key} is present"), active)
    })
}

/// Active when every predicate is. Evaluation stops at the first inactive
/// one.
#[must_use]
pub fn all_of(predicates: Vec<Predicate>) -> Predicate {
    Arc::new(move |stage: &StageContext| predicates.iter().all(|p| p(stage)))
}

/// Active when any predicate is. Evaluation stops at the first active one.
#[must_use]
pub fn any_of(predicates: Vec<Predicate>) -> Predicate {
    Arc::new(move |stage: &StageContext| predicates.iter().any(|p| p(stage)))
}

/// Inverts a predicate.
#[must_use]
pub fn not(predicate: Predicate) -> Predicate {
    Arc::new(move |stage: &StageContext| !predicate(stage))
}
