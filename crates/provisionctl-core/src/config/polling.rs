//! Polling and retry settings
//!
//! These settings are read once, at startup, and handed by value to the
//! transport, the waiters and the retry policy. Nothing re-reads them while a
//! wait is in progress.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{ConfigError, Result};

/// Tunables for wait loops and request retries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between polls, also sent to the server as the wait hint
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Consecutive transient errors after which a wait gives up
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Maximum attempts for retried request-response calls
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Base delay in milliseconds for the linear retry schedule
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_consecutive_errors: default_max_consecutive_errors(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PollingConfig {
    /// Reject settings that would make a wait loop spin against the backend
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_secs".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_consecutive_errors() -> u32 {
    4
}

fn default_retry_max_attempts() -> u32 {
    10
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}
