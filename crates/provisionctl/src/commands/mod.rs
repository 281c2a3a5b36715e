//! Command implementations

use anyhow::{Context, Result};
use provisionctl_core::{Config, Location, Region, Settings};

use crate::cli::LocationArgs;

pub mod config;
pub mod operation;
pub mod resource;

/// Resolve the selected profile into engine settings
pub fn settings(config: &Config, profile: Option<&str>) -> Result<Settings> {
    config
        .settings(profile)
        .context("Failed to resolve profile settings")
}

/// Explicit flags first, then the profile's location defaults
pub fn resolve_location(settings: &Settings, args: &LocationArgs) -> Result<Location> {
    let region = match (&args.provider, &args.region) {
        (Some(provider), Some(region)) => Some(Region::new(provider, region)),
        _ => None,
    };
    let location = settings.defaults.resolve(
        args.org.as_deref(),
        args.project.as_deref(),
        region.as_ref(),
    )?;
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisionctl_core::{LocationDefaults, PollingConfig};

    fn settings_with_defaults() -> Settings {
        Settings {
            profile: "test".to_string(),
            api_url: "https://api.example.test/v1".to_string(),
            api_token: "tok".to_string(),
            defaults: LocationDefaults {
                organization_id: Some("org-1".to_string()),
                project_id: Some("proj-1".to_string()),
                region: Some(Region::new("aws", "us-east-1")),
            },
            polling: PollingConfig::default(),
        }
    }

    #[test]
    fn test_flags_override_profile_location() {
        let args = LocationArgs {
            project: Some("proj-2".to_string()),
            provider: Some("gcp".to_string()),
            region: Some("europe-west1".to_string()),
            ..LocationArgs::default()
        };

        let location = resolve_location(&settings_with_defaults(), &args).unwrap();
        assert_eq!(location.organization_id, "org-1");
        assert_eq!(location.project_id, "proj-2");
        assert_eq!(location.region, Region::new("gcp", "europe-west1"));
    }

    #[test]
    fn test_missing_location_is_reported() {
        let mut settings = settings_with_defaults();
        settings.defaults = LocationDefaults::default();

        let err = resolve_location(&settings, &LocationArgs::default()).unwrap_err();
        assert!(err.to_string().contains("organization ID"));
    }
}
