//! Waiting for backend operations
//!
//! Every accepted mutation returns an operation id. The backend moves the
//! operation from `RUNNING` to `DONE` and, when the mutation failed, attaches
//! an error payload. [`OperationWaiter::wait`] polls until one of those
//! outcomes, absorbing short bursts of transient transport errors.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::budget::{DEFAULT_MAX_CONSECUTIVE_ERRORS, ErrorBudget};
use crate::config::PollingConfig;
use crate::context::WaitContext;
use crate::error::{CoreError, Result};
use crate::model::Location;
use crate::progress::{ProgressCallback, ProgressEvent, emit};
use crate::transport::ControlPlane;

/// Default time between polls, also used as the server-side wait hint
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls operations until they are `DONE`
#[derive(Clone)]
pub struct OperationWaiter {
    client: Arc<dyn ControlPlane>,
    poll_interval: Duration,
    max_consecutive_errors: u32,
    on_progress: Option<ProgressCallback>,
}

impl OperationWaiter {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            on_progress: None,
        }
    }

    pub fn from_config(client: Arc<dyn ControlPlane>, config: &PollingConfig) -> Self {
        Self::new(client)
            .poll_interval(config.poll_interval())
            .max_consecutive_errors(config.max_consecutive_errors)
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

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

    /// Poll `operation_id` until it is `DONE`
    ///
    /// Returns `Ok(())` when the operation finished without an error payload.
    /// Fails with [`CoreError::TerminalFailure`] carrying the backend code and
    /// message when it finished with one, with the last transport error once
    /// the consecutive-error threshold is reached, and with
    /// [`CoreError::Cancelled`]/[`CoreError::TimedOut`] when `ctx` ends first.
    ///
    /// Polls are never closer together than the poll interval, even when the
    /// server fails fast. A zero interval is rejected with
    /// [`CoreError::Validation`] before the first poll.
    pub async fn wait(
        &self,
        ctx: &WaitContext,
        operation_id: &str,
        location: &Location,
        operation_name: &str,
    ) -> Result<()> {
        let target = format!("operation {} ({})", operation_name, operation_id);
        if self.poll_interval.is_zero() {
            return Err(CoreError::Validation(format!(
                "poll interval for {} must be greater than zero",
                target
            )));
        }
        let started = Instant::now();
        let mut budget = ErrorBudget::consecutive(self.max_consecutive_errors);

        info!("Waiting for {} in {}", target, location);
        emit(
            &self.on_progress,
            ProgressEvent::Started {
                target: target.clone(),
            },
        );

        loop {
            let poll_started = Instant::now();

            let polled = ctx
                .run(
                    self.client
                        .get_operation(operation_id, location, self.poll_interval),
                )
                .await
                .map_err(|reason| reason.into_error(&target, started.elapsed()));

            match polled {
                Err(interrupted) => return Err(self.fail(&target, interrupted)),
                Ok(Err(api_err)) => {
                    let err = CoreError::request(&target, api_err);
                    if !budget.record(&err) {
                        return Err(self.fail(&target, err));
                    }
                    warn!(
                        "Polling {} failed ({}/{} consecutive errors): {}",
                        target,
                        budget.consecutive_errors(),
                        budget.max_consecutive(),
                        err
                    );
                    emit(
                        &self.on_progress,
                        ProgressEvent::Retrying {
                            target: target.clone(),
                            error: err.to_string(),
                            consecutive_errors: budget.consecutive_errors(),
                        },
                    );
                }
                Ok(Ok(operation)) => {
                    budget.reset();
                    debug!("{} is {}", target, operation.state);
                    emit(
                        &self.on_progress,
                        ProgressEvent::Polling {
                            target: target.clone(),
                            state: operation.state.to_string(),
                            elapsed: started.elapsed(),
                        },
                    );

                    if operation.is_done() {
                        if let Some(status) = operation.error {
                            let err = CoreError::TerminalFailure {
                                target: target.clone(),
                                detail: format!("error code {}: {}", status.code, status.message),
                            };
                            return Err(self.fail(&target, err));
                        }

                        info!("{} completed in {:?}", target, started.elapsed());
                        emit(
                            &self.on_progress,
                            ProgressEvent::Completed {
                                target,
                                elapsed: started.elapsed(),
                            },
                        );
                        return Ok(());
                    }
                }
            }

            let remaining = self.poll_interval.saturating_sub(poll_started.elapsed());
            if let Err(reason) = ctx.sleep(remaining).await {
                let err = reason.into_error(&target, started.elapsed());
                return Err(self.fail(&target, err));
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
