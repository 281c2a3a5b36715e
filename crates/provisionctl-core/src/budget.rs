//! Consecutive-error budget shared by every wait loop
//!
//! One policy applies everywhere: an error whose [`ErrorKind`](crate::ErrorKind)
//! is transient is absorbed until `max_consecutive` of them arrive back to
//! back; any other error ends the loop at once. A successful poll resets the
//! count. [`ErrorBudget::fail_fast`] is the zero-tolerance budget used by the
//! fast-fail wait strategy.

use crate::error::CoreError;

/// Default threshold: the fourth consecutive transient error is fatal
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBudget {
    max_consecutive: u32,
    consecutive: u32,
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::consecutive(DEFAULT_MAX_CONSECUTIVE_ERRORS)
    }
}

impl ErrorBudget {
    /// Give up when the `max` consecutive transient error arrives
    pub fn consecutive(max: u32) -> Self {
        Self {
            max_consecutive: max.max(1),
            consecutive: 0,
        }
    }

    /// Give up on the first error of any kind
    pub fn fail_fast() -> Self {
        Self::consecutive(1)
    }

    /// Count `err`; returns true if the loop may keep going
    pub fn record(&mut self, err: &CoreError) -> bool {
        if !err.is_retryable() {
            return false;
        }
        self.consecutive += 1;
        self.consecutive < self.max_consecutive
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive
    }

    pub fn max_consecutive(&self) -> u32 {
        self.max_consecutive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn transient() -> CoreError {
        ApiError::from_status(503, "unavailable").into()
    }

    #[test]
    fn test_fourth_consecutive_transient_error_exhausts_default_budget() {
        let mut budget = ErrorBudget::default();
        assert!(budget.record(&transient()));
        assert!(budget.record(&transient()));
        assert!(budget.record(&transient()));
        assert!(!budget.record(&transient()));
        assert_eq!(budget.consecutive_errors(), 4);
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut budget = ErrorBudget::consecutive(2);
        assert!(budget.record(&transient()));
        budget.reset();
        assert!(budget.record(&transient()));
        assert!(!budget.record(&transient()));
    }

    #[test]
    fn test_non_transient_error_is_never_absorbed() {
        let mut budget = ErrorBudget::default();
        let not_found: CoreError = ApiError::from_status(404, "gone").into();
        assert!(!budget.record(&not_found));
    }

    #[test]
    fn test_fail_fast_tolerates_nothing() {
        let mut budget = ErrorBudget::fail_fast();
        assert!(!budget.record(&transient()));
    }
}
