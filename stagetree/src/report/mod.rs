//! Run events and the reporters that receive them.
//!
//! The engine only emits [`RunEvent`]s; rendering is up to the reporter.

mod events;
mod sink;

pub use events::{step_prefix, RunEvent};
#[cfg(test)]
pub use sink::MockReporter;
pub use sink::{CollectingReporter, LoggingReporter, NoOpReporter, RecordedEvent, Reporter};
