//! Terminal spinner driven by core progress events

use indicatif::{ProgressBar, ProgressStyle};
use provisionctl_core::{ProgressCallback, ProgressEvent};
use std::sync::Arc;

/// Create a spinner and the callback that keeps it up to date
///
/// indicatif draws to stderr and stays hidden when stderr is not a terminal.
pub fn spinner(message: impl Into<String>) -> (ProgressBar, ProgressCallback) {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    let pb_clone = pb.clone();
    let callback: ProgressCallback = Arc::new(move |event: ProgressEvent| {
        pb_clone.set_message(describe(&event));
        if matches!(
            event,
            ProgressEvent::Completed { .. } | ProgressEvent::Failed { .. }
        ) {
            pb_clone.finish_and_clear();
        }
    });

    (pb, callback)
}

/// One-line description of an event
pub fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Started { target } => format!("Waiting for {}", target),
        ProgressEvent::Polling {
            target,
            state,
            elapsed,
        } => format!(
            "{}: {} ({:.0}s)",
            target,
            format_state(state),
            elapsed.as_secs_f64()
        ),
        ProgressEvent::Retrying {
            target,
            consecutive_errors,
            ..
        } => format!(
            "{}: retrying after error ({} in a row)",
            target, consecutive_errors
        ),
        ProgressEvent::Completed { target, elapsed } => {
            format!("{} completed in {:.0}s", target, elapsed.as_secs_f64())
        }
        ProgressEvent::Failed { target, error } => format!("{} failed: {}", target, error),
    }
}

/// Format a state for display with a status icon
fn format_state(state: &str) -> String {
    match state.to_uppercase().as_str() {
        "DONE" | "AVAILABLE" | "ACTIVE" | "READY" => format!("\u{2713} {}", state),
        "FAILED" | "ERROR" => format!("\u{2717} {}", state),
        "RUNNING" | "CREATING" | "PENDING" | "PROVISIONING" | "UPDATING" | "DELETING" => {
            format!("\u{21bb} {}", state)
        }
        _ => state.to_string(),
    }
}
