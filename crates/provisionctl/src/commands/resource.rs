//! `resource` commands

use anyhow::Result;
use provisionctl_core::{
    ApiError, Config, CoreError, HttpControlPlane, Location, RetryPolicy, StateMachineWaiter,
    WaitContext, WaitSpec, WaitStrategy,
};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{resolve_location, settings};
use crate::cli::{OutputFormat, ResourceCommands, StrategyArg};
use crate::progress;

pub async fn handle(
    cmd: &ResourceCommands,
    config: &Config,
    profile: Option<&str>,
    ctx: &WaitContext,
    output: OutputFormat,
) -> Result<()> {
    match cmd {
        ResourceCommands::Wait {
            path,
            target,
            pending,
            failure,
            state_field,
            strategy,
            location,
            wait,
        } => {
            let settings = settings(config, profile)?;
            let location = resolve_location(&settings, location)?;
            let client = HttpControlPlane::new(&settings)?;
            let segments = resource_segments(&location, path);

            let mut spec = WaitSpec::new(path.trim_matches('/'), target)
                .pending(pending.iter().cloned())
                .failure(failure.iter().cloned())
                .poll_interval(
                    wait.interval
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| settings.polling.poll_interval()),
                );
            if let Some(secs) = wait.timeout {
                spec = spec.timeout(Duration::from_secs(secs));
            }

            let strategy = match strategy {
                StrategyArg::FastFail => WaitStrategy::FastFail,
                StrategyArg::Switch => WaitStrategy::Switch,
            };
            let (pb, callback) = progress::spinner(format!("Waiting for {}", spec.resource));
            let waiter = StateMachineWaiter::new(strategy)
                .max_consecutive_errors(settings.polling.max_consecutive_errors)
                .on_progress(callback);
            let reads = RetryPolicy::from_config(&settings.polling);
            debug!("Waiting for {} in {} to reach {}", path, location, target);

            let result = waiter
                .wait(ctx, &spec, || {
                    refresh(
                        &client,
                        &reads,
                        ctx,
                        &segments,
                        &spec.resource,
                        state_field,
                    )
                })
                .await;
            pb.finish_and_clear();
            let resource = result?;

            match output {
                OutputFormat::Text => {
                    println!("{} reached {}", spec.resource, target);
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&resource)?);
                }
            }
            Ok(())
        }
    }
}

/// Fetch the resource once, retrying gateway errors, and pull out its state
async fn refresh(
    client: &HttpControlPlane,
    reads: &RetryPolicy,
    ctx: &WaitContext,
    segments: &[String],
    resource: &str,
    state_field: &str,
) -> provisionctl_core::Result<(Value, String)> {
    let body: Value = reads
        .execute(ctx, &format!("get {}", resource), || {
            client.get_json(segments)
        })
        .await?;
    let state = extract_state(&body, state_field).map_err(|e| CoreError::request(resource, e))?;
    Ok((body, state))
}

/// Location segments followed by the `/`-separated resource path
fn resource_segments(location: &Location, path: &str) -> Vec<String> {
    location
        .segments()
        .into_iter()
        .chain(path.split('/').filter(|s| !s.is_empty()))
        .map(str::to_string)
        .collect()
}

/// Read the state string out of a resource body
fn extract_state(resource: &Value, field: &str) -> Result<String, ApiError> {
    resource
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::decode(format!("response has no string field '{}'", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_state() {
        let body = json!({"id": "c-1", "state": "CREATING", "status": {"phase": "x"}});
        assert_eq!(extract_state(&body, "state").unwrap(), "CREATING");
        assert!(extract_state(&body, "status").is_err());
        assert!(extract_state(&body, "missing").is_err());
    }

    #[test]
    fn test_resource_segments_keep_identifiers_whole() {
        let location = Location::new("org-1", "proj-1", provisionctl_core::Region::new("aws", "eu-1"));
        let segments = resource_segments(&location, "/clusters/c-1/");

        assert_eq!(segments.len(), 10);
        assert_eq!(segments[0], "organizations");
        assert_eq!(segments[8..], ["clusters".to_string(), "c-1".to_string()]);
    }
}
