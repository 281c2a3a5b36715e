//! # provisionctl-core
//!
//! Polling, retry and reconciliation engine for eventually-consistent cloud
//! provisioning APIs.
//!
//! Mutations against the control plane return before the work is done: the
//! caller gets an operation handle or a resource sitting in a transitional
//! state, and has to poll until it converges. This crate provides the pieces
//! for doing that correctly:
//!
//! - [`RetryPolicy`] - status-code based retries for plain request/response calls
//! - [`OperationWaiter`] - polls an operation until it is `DONE`
//! - [`StateMachineWaiter`] - drives any resource through its pending states
//!   toward a target state, using a [`WaitSpec`]
//! - [`ReconciliationDispatcher`] - runs one create/read/update/delete for a
//!   declarative resource and commits what the backend reports
//! - [`KeyedMutex`] - serializes get-then-put updates on the same identity
//!
//! Every wait takes a [`WaitContext`] carrying the caller's cancellation token
//! and deadline. All sleeps observe it.
//!
//! ## Layout
//!
//! ```text
//! provisionctl-core/
//! ├── src/
//! │   ├── lib.rs
//! │   ├── error.rs       # CoreError, ApiError, ErrorKind
//! │   ├── model.rs       # Location, Region, Operation
//! │   ├── transport.rs   # ControlPlane trait, HttpControlPlane
//! │   ├── context.rs     # WaitContext
//! │   ├── budget.rs      # ErrorBudget
//! │   ├── retry.rs       # RetryPolicy
//! │   ├── operation.rs   # OperationWaiter
//! │   ├── waiter.rs      # StateMachineWaiter, WaitSpec
//! │   ├── keyed.rs       # KeyedMutex
//! │   ├── dispatcher.rs  # ReconciliationDispatcher
//! │   ├── progress.rs    # ProgressEvent
//! │   └── config/        # profiles, polling settings, credentials
//! ```

pub mod budget;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod keyed;
pub mod model;
pub mod operation;
pub mod progress;
pub mod retry;
pub mod transport;
pub mod waiter;

pub use budget::ErrorBudget;
pub use config::{Config, PollingConfig, Settings};
pub use context::{Interrupted, WaitContext};
pub use dispatcher::{
    Converter, LocationDefaults, ReconcileAction, Reconciled, ReconciliationDispatcher, StateSink,
};
pub use error::{ApiError, CoreError, ErrorKind, MAX_RETRY_AFTER, Result};
pub use keyed::{KeyedGuard, KeyedMutex};
pub use model::{Location, Operation, OperationState, OperationStatus, Region};
pub use operation::OperationWaiter;
pub use progress::{ProgressCallback, ProgressEvent};
pub use retry::{RetryPolicy, should_retry};
pub use transport::{ControlPlane, HttpControlPlane};
pub use waiter::{StateMachineWaiter, WaitSpec, WaitStrategy};
