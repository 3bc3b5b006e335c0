use crate::error::{Error, Result};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// A cancellable, optionally-deadlined context, threaded through every
/// public async operation.
///
/// This plays the role a caller-supplied context plays in other systems: a
/// `CancellationToken` for explicit cancellation, plus an optional deadline
/// checked at call sites that straddle a database round-trip.
#[derive(Clone, Debug)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context with no cancellation and no deadline.
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context bound to an existing cancellation token (e.g. a child
    /// derived from the store's own lifecycle token).
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derive a child context sharing this context's cancellation but with
    /// its own (possibly tighter) deadline.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.is_deadline_exceeded()
    }

    fn is_deadline_exceeded(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// Check at a suspension point (before/after a DB round-trip). Returns
    /// `Error::Cancelled` if the token is cancelled or the deadline has
    /// elapsed.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Remaining time until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_cancelled() {
        let ctx = Context::background();
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn explicit_cancel_is_observed() {
        let ctx = Context::background();
        ctx.cancel();
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn elapsed_deadline_is_observed() {
        let ctx = Context::with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn child_inherits_cancellation() {
        let ctx = Context::background();
        let child = ctx.child_with_timeout(Duration::from_secs(5));
        ctx.cancel();
        assert!(child.is_cancelled());
    }
}
