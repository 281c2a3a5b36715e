//! `operation` commands

use anyhow::Result;
use provisionctl_core::{Config, HttpControlPlane, OperationWaiter, WaitContext};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{resolve_location, settings};
use crate::cli::{OperationCommands, OutputFormat};
use crate::progress;

pub async fn handle(
    cmd: &OperationCommands,
    config: &Config,
    profile: Option<&str>,
    ctx: &WaitContext,
    output: OutputFormat,
) -> Result<()> {
    match cmd {
        OperationCommands::Wait {
            id,
            name,
            location,
            wait,
        } => {
            let settings = settings(config, profile)?;
            let location = resolve_location(&settings, location)?;
            let client = Arc::new(HttpControlPlane::new(&settings)?);

            let mut waiter = OperationWaiter::from_config(client, &settings.polling);
            if let Some(secs) = wait.interval {
                waiter = waiter.poll_interval(Duration::from_secs(secs));
            }

            let ctx = match wait.timeout {
                Some(secs) => ctx.child(Some(Duration::from_secs(secs))),
                None => ctx.clone(),
            };
            debug!("Waiting for operation {} at {}", id, location);

            let (pb, callback) = progress::spinner(format!("Waiting for operation {}", id));
            let started = Instant::now();
            let result = waiter
                .on_progress(callback)
                .wait(&ctx, id, &location, name)
                .await;
            pb.finish_and_clear();
            result?;

            match output {
                OutputFormat::Text => {
                    println!("Operation {} ({}) completed", name, id);
                }
                OutputFormat::Json => {
                    let value = json!({
                        "id": id,
                        "name": name,
                        "location": location,
                        "state": "DONE",
                        "elapsedSeconds": started.elapsed().as_secs_f64(),
                    });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
            }
            Ok(())
        }
    }
}
