//! Retry policy for direct request-response calls
//!
//! Long-running operations are handled by the waiters; this policy is for
//! the plain GET/list calls around them. Classification is by HTTP status:
//! a status inside the policy's retryable set is repeated on a linear
//! schedule, anything else is returned immediately.
//!
//! Rate-limited responses (429) are the one exception to the linear schedule:
//! when the server says how long to wait, the policy waits exactly that long.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::trace;

use crate::config::PollingConfig;
use crate::context::WaitContext;
use crate::error::{ApiError, CoreError, ErrorKind, MAX_RETRY_AFTER, Result};

/// Statuses worth repeating for listing and read calls
pub const READ_RETRYABLE_CODES: [u16; 3] = [502, 503, 504];

/// Status returned when the caller is rate limited
pub const RATE_LIMITED_CODE: u16 = 429;

/// Default attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Returns true iff `code` belongs to `retryable_codes`
pub fn should_retry(code: u16, retryable_codes: &BTreeSet<u16>) -> bool {
    retryable_codes.contains(&code)
}

/// Stateless description of how a call may be retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    retryable_codes: BTreeSet<u16>,
    retry_network_errors: bool,
}

impl RetryPolicy {
    /// A policy retrying exactly the given statuses
    pub fn new(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
            retryable_codes: codes.into_iter().collect(),
            retry_network_errors: false,
        }
    }

    /// 502/503/504 for listing and read calls
    pub fn for_reads() -> Self {
        Self::new(READ_RETRYABLE_CODES)
    }

    /// 429 only, waiting as long as the server asks
    pub fn for_rate_limit() -> Self {
        Self::new([RATE_LIMITED_CODE])
    }

    /// Read policy whose budget and base delay come from configuration
    pub fn from_config(config: &PollingConfig) -> Self {
        Self::for_reads()
            .max_attempts(config.retry_max_attempts)
            .base_delay(config.retry_base_delay())
    }

    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Also retry the given statuses
    #[must_use]
    pub fn with_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_codes.extend(codes);
        self
    }

    /// Also retry failures that produced no HTTP status at all
    #[must_use]
    pub fn retry_network_errors(mut self, enabled: bool) -> Self {
        self.retry_network_errors = enabled;
        self
    }

    pub fn retryable_codes(&self) -> &BTreeSet<u16> {
        &self.retryable_codes
    }

    /// Whether this policy would repeat a call that failed with `err`
    pub fn is_retryable(&self, err: &ApiError) -> bool {
        match err.status {
            Some(code) => should_retry(code, &self.retryable_codes),
            None => self.retry_network_errors && err.kind == ErrorKind::Network,
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    ///
    /// A server hint is honoured up to [`MAX_RETRY_AFTER`].
    pub fn delay_for(&self, attempt: u32, err: &ApiError) -> Duration {
        if err.status == Some(RATE_LIMITED_CODE)
            && let Some(hint) = err.retry_after
        {
            return hint.min(MAX_RETRY_AFTER);
        }
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `call` until it succeeds, fails terminally, or the budget runs out
    ///
    /// On exhaustion the last error is returned, attributed to `what`. Sleeps between
    /// attempts end early with [`CoreError::Cancelled`] or
    /// [`CoreError::TimedOut`] if `ctx` is done; `what` names the call in
    /// those errors.
    pub async fn execute<T, F, Fut>(&self, ctx: &WaitContext, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.is_retryable(&err) || attempt >= self.max_attempts {
                trace!(
                    "{}: giving up after attempt {}/{}: {}",
                    what, attempt, self.max_attempts, err
                );
                return Err(CoreError::request(what, err));
            }

            let delay = self.delay_for(attempt, &err);
            trace!(
                "{}: attempt {}/{} failed ({}), retrying in {:?}",
                what, attempt, self.max_attempts, err, delay
            );

            if let Err(reason) = ctx.sleep(delay).await {
                return Err(reason.into_error(what, ctx.elapsed()));
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_reads()
    }
}
