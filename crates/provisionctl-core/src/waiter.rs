//! Generic state-machine waiter
//!
//! Resources with a `state` field (clusters, peerings, private links, transit
//! gateway attachments, ...) all converge the same way: poll the resource,
//! look at the state, stop on the target, fail on a failure state, keep going
//! while the state is pending. [`StateMachineWaiter`] implements that loop
//! once, parameterized by a [`WaitSpec`] and a caller-supplied refresh
//! function.
//!
//! Two strategies are supported, and they differ in how much they tolerate:
//!
//! - [`WaitStrategy::FastFail`]: any refresh error ends the wait, and so does
//!   any state outside `{target} ∪ pending`.
//! - [`WaitStrategy::Switch`]: only the target and the failure states (plus
//!   the `FAILED` literal) end the wait; other states are logged and polled
//!   through. Transient refresh errors are absorbed by the shared
//!   consecutive-error budget.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::budget::{DEFAULT_MAX_CONSECUTIVE_ERRORS, ErrorBudget};
use crate::context::WaitContext;
use crate::error::{CoreError, Result};
use crate::progress::{ProgressCallback, ProgressEvent, emit};

/// Failure literal the switch strategy always treats as fatal
pub const FAILED_STATE: &str = "FAILED";

/// Default time between refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// What to wait for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    /// Human-readable name of the resource, used in logs and errors
    pub resource: String,
    pub target: String,
    pub pending: BTreeSet<String>,
    pub failure: BTreeSet<String>,
    pub poll_interval: Duration,
    /// Overall bound, further limited by the context deadline
    pub timeout: Option<Duration>,
}

impl WaitSpec {
    pub fn new(resource: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            target: target.into(),
            pending: BTreeSet::new(),
            failure: BTreeSet::new(),
            poll_interval: DEFAULT_REFRESH_INTERVAL,
            timeout: None,
        }
    }

    #[must_use]
    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.extend(states.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn failure<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure.extend(states.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check that target, pending and failure states are disjoint
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(CoreError::Validation(format!(
                "{}: target state must not be empty",
                self.resource
            )));
        }
        if self.pending.contains(&self.target) || self.failure.contains(&self.target) {
            return Err(CoreError::Validation(format!(
                "{}: target state '{}' is also listed as pending or failure",
                self.resource, self.target
            )));
        }
        if let Some(state) = self.pending.intersection(&self.failure).next() {
            return Err(CoreError::Validation(format!(
                "{}: state '{}' is both pending and failure",
                self.resource, state
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::Validation(format!(
                "{}: poll interval must be positive",
                self.resource
            )));
        }
        Ok(())
    }

    fn expected(&self) -> String {
        std::iter::once(self.target.as_str())
            .chain(self.pending.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Iteration style of a state-machine wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Abort on the first refresh error or on any undeclared state
    FastFail,
    /// Stop only on target or failure; tolerate transient refresh errors
    Switch,
}

/// Drives a resource toward its target state
#[derive(Clone)]
pub struct StateMachineWaiter {
    strategy: WaitStrategy,
    max_consecutive_errors: u32,
    on_progress: Option<ProgressCallback>,
}

impl StateMachineWaiter {
    pub fn new(strategy: WaitStrategy) -> Self {
        Self {
            strategy,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            on_progress: None,
        }
    }

    pub fn fast_fail() -> Self {
        Self::new(WaitStrategy::FastFail)
    }

    pub fn switch() -> Self {
        Self::new(WaitStrategy::Switch)
    }

    /// Error budget for the switch strategy; fast-fail ignores it
    #[must_use]
    pub fn max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    #[must_use]
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    /// Refresh until the resource reaches `spec.target`
    ///
    /// `refresh` returns the current resource and its state string. Refreshes
    /// are strictly sequential and at least `spec.poll_interval` apart; the
    /// call returns as soon as the target is observed, without a final sleep.
    pub async fn wait<R, F, Fut>(&self, ctx: &WaitContext, spec: &WaitSpec, mut refresh: F) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(R, String)>>,
    {
        spec.validate()?;

        let ctx = ctx.child(spec.timeout);
        let target = spec.resource.as_str();
        let started = Instant::now();
        let mut budget = match self.strategy {
            WaitStrategy::FastFail => ErrorBudget::fail_fast(),
            WaitStrategy::Switch => ErrorBudget::consecutive(self.max_consecutive_errors),
        };

        info!(
            "Waiting for {} to reach {} ({:?})",
            target, spec.target, self.strategy
        );
        emit(
            &self.on_progress,
            ProgressEvent::Started {
                target: target.to_string(),
            },
        );

        loop {
            let refresh_started = Instant::now();

            let refreshed = ctx
                .run(refresh())
                .await
                .map_err(|reason| reason.into_error(target, started.elapsed()));

            match refreshed {
                Err(interrupted) => return Err(self.fail(target, interrupted)),
                Ok(Err(err)) => {
                    if !budget.record(&err) {
                        return Err(self.fail(target, err));
                    }
                    warn!(
                        "Refreshing {} failed ({}/{} consecutive errors): {}",
                        target,
                        budget.consecutive_errors(),
                        budget.max_consecutive(),
                        err
                    );
                    emit(
                        &self.on_progress,
                        ProgressEvent::Retrying {
                            target: target.to_string(),
                            error: err.to_string(),
                            consecutive_errors: budget.consecutive_errors(),
                        },
                    );
                }
                Ok(Ok((resource, state))) => {
                    budget.reset();
                    emit(
                        &self.on_progress,
                        ProgressEvent::Polling {
                            target: target.to_string(),
                            state: state.clone(),
                            elapsed: started.elapsed(),
                        },
                    );

                    if state == spec.target {
                        info!("{} reached {} in {:?}", target, state, started.elapsed());
                        emit(
                            &self.on_progress,
                            ProgressEvent::Completed {
                                target: target.to_string(),
                                elapsed: started.elapsed(),
                            },
                        );
                        return Ok(resource);
                    }

                    if let Some(err) = self.classify(spec, &state) {
                        return Err(self.fail(target, err));
                    }
                    debug!("{} is {}, waiting for {}", target, state, spec.target);
                }
            }

            let remaining = spec.poll_interval.saturating_sub(refresh_started.elapsed());
            if let Err(reason) = ctx.sleep(remaining).await {
                let err = reason.into_error(target, started.elapsed());
                return Err(self.fail(target, err));
            }
        }
    }

    /// Returns the error that ends the wait for a non-target `state`, if any
    fn classify(&self, spec: &WaitSpec, state: &str) -> Option<CoreError> {
        let is_failure = spec.failure.contains(state)
            || (self.strategy == WaitStrategy::Switch && state == FAILED_STATE);
        if is_failure {
            return Some(CoreError::TerminalFailure {
                target: spec.resource.clone(),
                detail: format!("entered failure state '{}'", state),
            });
        }

        match self.strategy {
            WaitStrategy::FastFail if !spec.pending.contains(state) => {
                Some(CoreError::UnexpectedState {
                    target: spec.resource.clone(),
                    state: state.to_string(),
                    expected: spec.expected(),
                })
            }
            WaitStrategy::FastFail => None,
            WaitStrategy::Switch => {
                if !spec.pending.is_empty() && !spec.pending.contains(state) {
                    warn!(
                        "{} reported undeclared state '{}', still waiting for {}",
                        spec.resource, state, spec.target
                    );
                }
                None
            }
        }
    }

    fn fail(&self, target: &str, err: CoreError) -> CoreError {
        emit(
            &self.on_progress,
            ProgressEvent::Failed {
                target: target.to_string(),
                error: err.to_string(),
            },
        );
        err
    }
}
