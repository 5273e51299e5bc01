//! Run context: cancellation and deadline handed to every step

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline.
///
/// Cloning shares the token; [`RunContext::with_timeout`] derives a context
/// with a tighter deadline without touching the parent.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Deadline>,
}

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    pub at: Instant,
    /// The limit the deadline was derived from, reported on expiry
    pub limit: Duration,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Derive a context that expires `limit` from now, or earlier if the
    /// current deadline is sooner.
    ///
    /// A limit too large to represent as an instant adds no deadline.
    pub fn with_timeout(&self, limit: Duration) -> Self {
        let candidate = Instant::now()
            .checked_add(limit)
            .map(|at| Deadline { at, limit });
        let deadline = match (self.deadline, candidate) {
            (Some(current), Some(candidate)) if candidate.at < current.at => Some(candidate),
            (Some(current), _) => Some(current),
            (None, candidate) => candidate,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Resolves when the deadline passes; never resolves without one
    pub(crate) async fn expired(&self) -> Duration {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline.at).await;
                deadline.limit
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_keeps_earliest_deadline() {
        let ctx = RunContext::new();
        assert!(ctx.deadline().is_none());

        let short = ctx.with_timeout(Duration::from_millis(50));
        let long = short.with_timeout(Duration::from_secs(60));
        assert_eq!(long.deadline().unwrap().limit, Duration::from_millis(50));

        let shorter = long.with_timeout(Duration::from_millis(10));
        assert_eq!(shorter.deadline().unwrap().limit, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_adds_no_deadline() {
        let ctx = RunContext::new().with_timeout(Duration::MAX);
        assert!(ctx.deadline().is_none());

        let bounded = RunContext::new().with_timeout(Duration::from_secs(5));
        let still_bounded = bounded.with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(still_bounded.deadline().unwrap().limit, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_derived_context_shares_cancellation() {
        let ctx = RunContext::new();
        let derived = ctx.with_timeout(Duration::from_secs(1));
        ctx.cancel();
        assert!(derived.is_cancelled());
    }

    #[tokio::test]
    async fn test_expired_reports_limit() {
        let ctx = RunContext::new().with_timeout(Duration::from_millis(20));
        let limit = ctx.expired().await;
        assert_eq!(limit, Duration::from_millis(20));
    }
}
