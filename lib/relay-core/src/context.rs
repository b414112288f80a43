//! Cancellation and deadline propagation.
//!
//! A [`Context`] pairs a [`CancellationToken`] with an optional deadline.
//! Derived contexts use child tokens: canceling a parent cancels every
//! child, and a derived deadline never extends past the parent's.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{ErrorKind, Result};

/// Cancellation token plus optional deadline, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context: never canceled, no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Context driven by an existing token.
    #[must_use]
    pub const fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Child context that can be canceled independently.
    #[must_use]
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Child context expiring after `timeout`.
    ///
    /// The guard cancels the child when dropped.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> (Self, DropGuard) {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context expiring at `deadline`, or at the parent deadline if earlier.
    ///
    /// The guard cancels the child when dropped.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> (Self, DropGuard) {
        let token = self.token.child_token();
        let guard = token.clone().drop_guard();
        let deadline = self.deadline.map_or(deadline, |parent| parent.min(deadline));
        let ctx = Self {
            token,
            deadline: Some(deadline),
        };
        (ctx, guard)
    }

    /// Cancel this context and its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once canceled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Underlying token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` until it completes, the context is canceled or the deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Canceled`] or [`ErrorKind::Timeout`] when the
    /// context ends first, otherwise the future's own result.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(ErrorKind::Canceled.into()),
            () = deadline => Err(ErrorKind::Timeout.into()),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    #[tokio::test(start_paused = true)]
    async fn run_completes_before_deadline() {
        let (ctx, _guard) = Context::background().with_timeout(Duration::from_secs(1));
        let value = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(7)
            })
            .await
            .expect("value");
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out() {
        let (ctx, _guard) = Context::background().with_timeout(Duration::from_millis(50));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .expect_err("timeout");
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn run_canceled() {
        let ctx = Context::background();
        ctx.cancel();
        let err = ctx
            .run(std::future::pending::<Result<()>>())
            .await
            .expect_err("canceled");
        assert_eq!(err.category(), ErrorCategory::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn child_deadline_never_extends_parent() {
        let (parent, _parent_guard) = Context::background().with_timeout(Duration::from_secs(1));
        let (child, _child_guard) = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn guard_cancels_child_only() {
        let parent = Context::background();
        let (child, guard) = parent.with_timeout(Duration::from_secs(1));
        drop(guard);
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let child = parent.with_cancel();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
