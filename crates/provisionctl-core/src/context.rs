//! Cancellation and deadline handling for wait loops
//!
//! Every suspension point in the engine goes through [`WaitContext::sleep`] or
//! [`WaitContext::sleep_until`], so no sleep is ever uninterruptible.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// Why a wait was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

impl Interrupted {
    /// Convert into the error surfaced to callers, naming what was awaited
    pub fn into_error(self, target: impl Into<String>, elapsed: Duration) -> CoreError {
        match self {
            Interrupted::Cancelled => CoreError::Cancelled {
                target: target.into(),
            },
            Interrupted::DeadlineExceeded => CoreError::TimedOut {
                target: target.into(),
                after: elapsed,
            },
        }
    }
}

/// Caller-owned cancellation token plus an optional absolute deadline
#[derive(Debug, Clone)]
pub struct WaitContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    started: Instant,
}

impl Default for WaitContext {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitContext {
    /// A context that is only ever interrupted through its token
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            started: Instant::now(),
        }
    }

    /// Wrap an existing token, e.g. one wired to Ctrl-C
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::new()
        }
    }

    /// Set a deadline relative to now. An earlier existing deadline wins.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Set an absolute deadline. An earlier existing deadline wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Derive a child context sharing cancellation and tightened by `timeout`
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let child = Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            started: Instant::now(),
        };
        match timeout {
            Some(t) => child.with_timeout(t),
            None => child,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time since this context was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Total budget between creation and the deadline
    pub fn budget(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(self.started))
    }

    /// Returns the interruption reason if the context is already done
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless cancelled or the deadline passes first
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    /// Sleep for `duration` unless cancelled or the deadline passes first
    ///
    /// A duration too long to add to the current instant sleeps until the
    /// deadline or cancellation, whichever comes first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.wait_until(Instant::now().checked_add(duration)).await
    }

    /// Sleep until `wake` unless cancelled or the deadline passes first
    pub async fn sleep_until(&self, wake: Instant) -> Result<(), Interrupted> {
        self.wait_until(Some(wake)).await
    }

    /// `None` is a wake time beyond what `Instant` can represent
    async fn wait_until(&self, wake: Option<Instant>) -> Result<(), Interrupted> {
        self.check()?;

        match (wake, self.deadline) {
            (Some(wake), deadline) if deadline.is_none_or(|d| wake < d) => {
                tokio::select! {
                    _ = self.token.cancelled() => Err(Interrupted::Cancelled),
                    _ = tokio::time::sleep_until(wake) => Ok(()),
                }
            }
            (Some(wake), None) => {
                tokio::select! {
                    _ = self.token.cancelled() => Err(Interrupted::Cancelled),
                    _ = tokio::time::sleep_until(wake) => Ok(()),
                }
            }
            (_, Some(deadline)) => {
                tokio::select! {
                    _ = self.token.cancelled() => Err(Interrupted::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(Interrupted::DeadlineExceeded),
                }
            }
            (None, None) => {
                self.token.cancelled().await;
                Err(Interrupted::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_interruption() {
        let ctx = WaitContext::new();
        let start = Instant::now();

        assert!(ctx.sleep(Duration::from_secs(5)).await.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_observes_cancellation() {
        let ctx = WaitContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result = ctx.sleep(Duration::from_secs(60)).await;

        assert_eq!(result, Err(Interrupted::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_stops_at_deadline() {
        let ctx = WaitContext::new().with_timeout(Duration::from_secs(3));
        let start = Instant::now();

        let result = ctx.sleep(Duration::from_secs(10)).await;

        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(ctx.check(), Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_sleep_stops_at_deadline() {
        let ctx = WaitContext::new().with_timeout(Duration::from_secs(1));
        let start = Instant::now();

        let result = ctx.sleep(Duration::from_secs(u64::MAX)).await;

        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_sleep_without_deadline_ends_on_cancel() {
        let ctx = WaitContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });

        let result = ctx.sleep(Duration::MAX).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[test]
    fn test_unrepresentable_timeout_leaves_no_deadline() {
        let ctx = WaitContext::new().with_timeout(Duration::MAX);
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_abandons_slow_future_at_deadline() {
        let ctx = WaitContext::new().with_timeout(Duration::from_secs(2));

        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(30)))
            .await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));

        let fresh = WaitContext::new();
        assert_eq!(fresh.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_deadline_wins() {
        let ctx = WaitContext::new()
            .with_timeout(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(50));
        assert_eq!(ctx.budget(), Some(Duration::from_secs(5)));

        let child = ctx.child(Some(Duration::from_secs(2)));
        assert_eq!(child.budget(), Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_is_cancelled_with_parent() {
        let parent = WaitContext::new();
        let child = parent.child(None);

        parent.cancel();
        assert_eq!(child.check(), Err(Interrupted::Cancelled));
    }
}
