//! Per-call cancellation and deadline token.
//!
//! # Responsibility
//! - Carry caller-controlled abort/timeout state into every storer call.
//! - Let the storer check for abort at each store round-trip boundary.
//!
//! # Invariants
//! - Once a context reports done it stays done.
//! - Cloned contexts share one cancellation token.
//! - Cancelling a child context never cancels its parent.

use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("call was cancelled")]
    Cancelled,
    #[error("call deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellable, optionally time-bounded call token.
///
/// The cancel half is a [`CancellationToken`]; it is polled synchronously,
/// so no async runtime is required.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl CallContext {
    /// Context that never expires and is only cancelled through its own token.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    /// Returns a copy of this context bounded by `deadline`.
    ///
    /// An existing earlier deadline is kept.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Returns a copy of this context driven by `token`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Derives a context that is cancelled with this one but can also be
    /// cancelled on its own. The deadline carries over.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
        }
    }

    /// Token that cancels this context and every context cloned from it.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `Err` once the context is cancelled or past its deadline.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.token.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        if self
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            return Err(ContextError::DeadlineExceeded);
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::{CallContext, ContextError};
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    #[test]
    fn background_context_is_never_done() {
        let ctx = CallContext::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn cancel_is_shared_by_clones() {
        let ctx = CallContext::background();
        let cloned = ctx.clone();
        assert!(!cloned.is_done());

        ctx.cancellation_token().cancel();
        assert_eq!(ctx.check(), Err(ContextError::Cancelled));
        assert_eq!(cloned.check(), Err(ContextError::Cancelled));
    }

    #[test]
    fn external_token_drives_the_context() {
        let token = CancellationToken::new();
        let ctx = CallContext::background().with_cancellation(token.clone());

        token.cancel();
        assert!(ctx.is_done());
    }

    #[test]
    fn child_cancellation_does_not_reach_parent() {
        let parent = CallContext::with_timeout(Duration::from_secs(60));
        let child = parent.child();
        assert_eq!(child.deadline(), parent.deadline());

        child.cancellation_token().cancel();
        assert_eq!(child.check(), Err(ContextError::Cancelled));
        assert!(parent.check().is_ok());

        let second_child = parent.child();
        parent.cancellation_token().cancel();
        assert_eq!(second_child.check(), Err(ContextError::Cancelled));
    }

    #[test]
    fn expired_deadline_reports_deadline_exceeded() {
        let ctx = CallContext::with_timeout(Duration::ZERO);
        assert_eq!(ctx.check(), Err(ContextError::DeadlineExceeded));
    }

    #[test]
    fn deadline_at_keeps_the_earlier_deadline() {
        let now = Instant::now();
        let early = now + Duration::from_secs(1);
        let late = now + Duration::from_secs(60);

        let ctx = CallContext::background().deadline_at(early).deadline_at(late);
        assert_eq!(ctx.deadline(), Some(early));
    }

    #[test]
    fn cancellation_wins_over_pending_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_secs(60));
        ctx.cancellation_token().cancel();
        assert_eq!(ctx.check(), Err(ContextError::Cancelled));
    }
}
