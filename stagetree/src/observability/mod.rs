//! Observability: subscriber setup and timers.

mod subscriber;
mod timer;

pub use subscriber::{init_tracing, LogFormat};
pub use timer::SpanTimer;
