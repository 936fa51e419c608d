//! Composite cancellation signal: a manual flag plus an optional deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// A cooperative cancellation signal.
///
/// A signal fires when its manual flag is triggered (directly or through any
/// ancestor signal) or when its deadline passes. Child signals OR the flags of
/// their whole chain and keep the earliest deadline.
///
/// Firing never preempts anything; running work has to observe the signal.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// Creates a root signal with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root signal that times out after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Wraps an existing token, e.g. one shared with a Ctrl-C handler.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Creates a linked child signal.
    ///
    /// The child fires whenever this signal fires. Triggering the child does
    /// not affect this signal. When `timeout` is set, the child's deadline is
    /// the earlier of this signal's deadline and `now + timeout`.
    #[must_use]
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Triggers the manual flag of this signal and all its children.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Returns true if the manual flag of this signal or any ancestor is set.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns true if the deadline has passed.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns true if the signal has fired for any reason.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.is_triggered() || self.is_timed_out()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` means no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Runs `fut` until it completes or the signal fires.
    ///
    /// Returns `None` if the signal fired first; `fut` is dropped in that case.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}
