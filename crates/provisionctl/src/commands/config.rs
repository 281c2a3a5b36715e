//! `config` commands

use anyhow::{Context, Result};
use provisionctl_core::{Config, Settings};
use serde_json::{Value, json};
use std::path::Path;

use super::settings;
use crate::cli::{ConfigCommands, OutputFormat};

pub fn handle(
    cmd: &ConfigCommands,
    config: &Config,
    config_path: Option<&Path>,
    profile: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let settings = settings(config, profile)?;
            let value = settings_json(&settings);
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
                OutputFormat::Text => print_settings(&settings),
            }
            Ok(())
        }
        ConfigCommands::Path => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => Config::config_path().context("Failed to determine config path")?,
            };
            match output {
                OutputFormat::Json => println!("{}", json!({ "path": path.display().to_string() })),
                OutputFormat::Text => println!("{}", path.display()),
            }
            Ok(())
        }
    }
}

/// Settings as JSON, with the token redacted
fn settings_json(settings: &Settings) -> Value {
    json!({
        "profile": settings.profile,
        "apiUrl": settings.api_url,
        "apiToken": redact(&settings.api_token),
        "organizationId": settings.defaults.organization_id,
        "projectId": settings.defaults.project_id,
        "region": settings.defaults.region,
        "polling": settings.polling,
    })
}

fn print_settings(settings: &Settings) {
    let defaults = &settings.defaults;
    println!("Profile:      {}", settings.profile);
    println!("API URL:      {}", settings.api_url);
    println!("API token:    {}", redact(&settings.api_token));
    println!(
        "Organization: {}",
        defaults.organization_id.as_deref().unwrap_or("-")
    );
    println!(
        "Project:      {}",
        defaults.project_id.as_deref().unwrap_or("-")
    );
    println!(
        "Region:       {}",
        defaults
            .region
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string)
    );
    println!(
        "Polling:      every {}s, give up after {} consecutive errors",
        settings.polling.poll_interval_secs, settings.polling.max_consecutive_errors
    );
}

/// Keep the last four characters of a secret
fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisionctl_core::{LocationDefaults, PollingConfig, Region};

    #[test]
    fn test_redact() {
        assert_eq!(redact("short"), "****");
        assert_eq!(redact("pk_live_1234567890abcd"), "****abcd");
    }

    #[test]
    fn test_settings_json_never_contains_token() {
        let settings = Settings {
            profile: "prod".to_string(),
            api_url: "https://api.example.test/v1".to_string(),
            api_token: "super-secret-token-value".to_string(),
            defaults: LocationDefaults {
                organization_id: Some("org-1".to_string()),
                project_id: None,
                region: Some(Region::new("aws", "us-east-1")),
            },
            polling: PollingConfig::default(),
        };

        let value = settings_json(&settings);
        let text = value.to_string();

        assert!(!text.contains("super-secret"));
        assert_eq!(value["apiToken"], "****alue");
        assert_eq!(value["region"]["provider"], "aws");
        assert_eq!(value["polling"]["poll_interval_secs"], 5);
        assert!(value["projectId"].is_null());
    }
}
