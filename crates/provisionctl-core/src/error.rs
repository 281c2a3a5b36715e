//! Unified error handling for provisionctl-core
//!
//! Transport failures are classified exactly once, when the HTTP response (or
//! the lack of one) is turned into an [`ApiError`]. Retry, wait and dispatch
//! code only ever match on [`ErrorKind`].
//!
//! # Example
//!
//! ```rust
//! use provisionctl_core::{ApiError, CoreError};
//!
//! fn describe(err: &CoreError) -> &'static str {
//!     if err.is_not_found() {
//!         "gone"
//!     } else if err.is_retryable() {
//!         "try again"
//!     } else {
//!         "fatal"
//!     }
//! }
//!
//! let err: CoreError = ApiError::from_status(503, "upstream unavailable").into();
//! assert_eq!(describe(&err), "try again");
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Longest server-communicated retry delay that is honoured as-is
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Classification of a failed API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 400
    BadRequest,
    /// 401/403
    Unauthorized,
    /// 404
    NotFound,
    /// 409/412
    Conflict,
    /// 429
    RateLimited,
    /// 502/503/504
    Unavailable,
    /// Any other 5xx
    Server,
    /// No response was received (connect, reset, timeout)
    Network,
    /// A response arrived but could not be decoded
    Decode,
    /// Anything else
    Other,
}

impl ErrorKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::BadRequest,
            401 | 403 => ErrorKind::Unauthorized,
            404 => ErrorKind::NotFound,
            409 | 412 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            502..=504 => ErrorKind::Unavailable,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Other,
        }
    }

    /// Transient kinds may succeed if the same request is repeated
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Unavailable | ErrorKind::Network
        )
    }
}

/// A failed call against the provisioning API
#[derive(Error, Debug, Clone)]
#[error("{}", self.describe())]
pub struct ApiError {
    pub kind: ErrorKind,
    /// HTTP status, absent when no response was received
    pub status: Option<u16>,
    pub message: String,
    /// Backend-specific error code from the error body
    pub code: Option<i64>,
    /// Server-communicated delay before the request may be repeated
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            message: message.into(),
            code: None,
            retry_after: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            status: None,
            message: message.into(),
            code: None,
            retry_after: None,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Decode,
            status: None,
            message: message.into(),
            code: None,
            retry_after: None,
        }
    }

    /// A request that could not be built, e.g. an unusable path segment
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Other,
            status: None,
            message: message.into(),
            code: None,
            retry_after: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: Option<i64>) -> Self {
        self.code = code;
        self
    }

    /// Attach a retry hint, capped at [`MAX_RETRY_AFTER`]
    #[must_use]
    pub fn with_retry_after(mut self, delay: Option<Duration>) -> Self {
        self.retry_after = delay.map(|d| d.min(MAX_RETRY_AFTER));
        self
    }

    fn describe(&self) -> String {
        match (self.status, self.code) {
            (Some(status), Some(code)) => {
                format!("HTTP {} (code {}): {}", status, code, self.message)
            }
            (Some(status), None) => format!("HTTP {}: {}", status, self.message),
            (None, _) => self.message.clone(),
        }
    }
}

/// Core error type for every operation in this crate
#[derive(Error, Debug)]
pub enum CoreError {
    /// Error returned by the provisioning API
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// API error attributed to the resource or operation being worked on
    #[error("{target}: {source}")]
    Request {
        target: String,
        #[source]
        source: ApiError,
    },

    /// The caller cancelled before convergence
    #[error("{target}: cancelled while waiting")]
    Cancelled { target: String },

    /// The deadline expired before convergence
    #[error("{target}: timed out after {after:?}")]
    TimedOut { target: String, after: Duration },

    /// The backend explicitly reported a failure
    #[error("{target} failed: {detail}")]
    TerminalFailure { target: String, detail: String },

    /// The backend reported a state outside the declared state machine
    #[error("{target}: unexpected state '{state}' (expected one of: {expected})")]
    UnexpectedState {
        target: String,
        state: String,
        expected: String,
    },

    /// Invalid input detected before any request was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Attribute an API error to `target`
    pub fn request(target: impl Into<String>, source: ApiError) -> Self {
        CoreError::Request {
            target: target.into(),
            source,
        }
    }

    /// Classification of the underlying API error, if any
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CoreError::Api(e) | CoreError::Request { source: e, .. } => Some(e.kind),
            _ => None,
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }

    /// Returns true if this is a rate limiting error (429)
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.kind() == Some(ErrorKind::RateLimited)
    }

    /// Returns true if repeating the failed request might succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_some_and(ErrorKind::is_transient)
    }

    /// Returns true if the caller cancelled or the deadline expired
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CoreError::Cancelled { .. } | CoreError::TimedOut { .. }
        )
    }

    /// Returns true only for deadline expiry
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::TimedOut { .. })
    }

    /// Returns true if the backend itself reported a failure or an unknown state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CoreError::TerminalFailure { .. } | CoreError::UnexpectedState { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(502), ErrorKind::Unavailable);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Unavailable);
        assert_eq!(ErrorKind::from_status(504), ErrorKind::Unavailable);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::Other);
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::RateLimited.is_transient());
        assert!(ErrorKind::Unavailable.is_transient());
        assert!(ErrorKind::Network.is_transient());
        assert!(!ErrorKind::Server.is_transient());
        assert!(!ErrorKind::NotFound.is_transient());
        assert!(!ErrorKind::Decode.is_transient());
    }

    #[test]
    fn test_core_error_from_api() {
        let core_err: CoreError = ApiError::from_status(404, "cluster not found").into();

        assert!(core_err.is_not_found());
        assert!(!core_err.is_retryable());
        assert!(!core_err.is_cancelled());
        assert!(core_err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_cancellation_is_distinct_from_backend_failure() {
        let cancelled = CoreError::Cancelled {
            target: "operation create-cluster (op-1)".to_string(),
        };
        let timed_out = CoreError::TimedOut {
            target: "cluster c-1".to_string(),
            after: Duration::from_secs(60),
        };
        let failed = CoreError::TerminalFailure {
            target: "cluster c-1".to_string(),
            detail: "state FAILED".to_string(),
        };

        assert!(cancelled.is_cancelled() && !cancelled.is_timeout());
        assert!(timed_out.is_cancelled() && timed_out.is_timeout());
        assert!(!failed.is_cancelled() && failed.is_terminal());
        assert!(cancelled.to_string().contains("op-1"));
    }

    #[test]
    fn test_request_error_names_target_and_keeps_kind() {
        let err = CoreError::request(
            "operation create-cluster (op-7)",
            ApiError::from_status(503, "upstream unavailable"),
        );

        assert!(err.is_retryable());
        assert_eq!(err.kind(), Some(ErrorKind::Unavailable));
        let text = err.to_string();
        assert!(text.contains("op-7"));
        assert!(text.contains("HTTP 503"));
    }

    #[test]
    fn test_network_error_display_has_no_status() {
        let err = ApiError::network("connection reset by peer");
        assert_eq!(err.to_string(), "connection reset by peer");
        assert!(err.status.is_none());
    }

    #[test]
    fn test_retry_hint_is_capped() {
        let err = ApiError::from_status(429, "slow down")
            .with_retry_after(Some(Duration::from_secs(u64::MAX)));
        assert_eq!(err.retry_after, Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_backend_code_is_displayed() {
        let err = ApiError::from_status(503, "upstream unavailable").with_code(Some(14));
        assert_eq!(err.to_string(), "HTTP 503 (code 14): upstream unavailable");
    }
}
