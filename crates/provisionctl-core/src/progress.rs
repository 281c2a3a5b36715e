//! Progress events for long-running waits
//!
//! Both the operation waiter and the state-machine waiter report what they are
//! doing through an optional callback. The CLI turns these into a spinner;
//! library callers usually pass nothing and rely on `tracing` output instead.

use std::sync::Arc;
use std::time::Duration;

/// Progress events emitted during a wait
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The wait has started
    Started { target: String },
    /// One poll finished with the given observed state
    Polling {
        target: String,
        state: String,
        elapsed: Duration,
    },
    /// A poll failed and the error was absorbed by the error budget
    Retrying {
        target: String,
        error: String,
        consecutive_errors: u32,
    },
    /// The wait reached its target
    Completed { target: String, elapsed: Duration },
    /// The wait ended with an error
    Failed { target: String, error: String },
}

/// Callback type for progress updates
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Helper to emit progress events
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_without_callback_is_noop() {
        emit(
            &None,
            ProgressEvent::Started {
                target: "op-1".to_string(),
            },
        );
    }

    #[test]
    fn test_emit_forwards_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |event| sink.lock().unwrap().push(event));

        emit(
            &Some(callback),
            ProgressEvent::Completed {
                target: "op-1".to_string(),
                elapsed: Duration::from_secs(3),
            },
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], ProgressEvent::Completed { .. }));
    }
}
