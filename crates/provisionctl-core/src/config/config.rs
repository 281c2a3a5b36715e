//! Configuration file handling
//!
//! Configuration is stored in TOML with one table per named profile. A profile
//! carries the API endpoint, the credential, and the provider-level location
//! defaults used when a resource does not name its own organization, project
//! or region.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::credential::resolve_secret;
use super::error::{ConfigError, Result};
use super::polling::PollingConfig;
use crate::dispatcher::LocationDefaults;
use crate::model::Region;

/// Environment variable that overrides every profile's API token
pub const API_TOKEN_ENV: &str = "PROVISIONCTL_API_TOKEN";

/// Environment variable that overrides every profile's API URL
pub const API_URL_ENV: &str = "PROVISIONCTL_API_URL";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is given explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    /// Global polling settings, overridable per profile
    #[serde(default)]
    pub polling: PollingConfig,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Individual profile configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token. Supports the `keyring:` prefix for secure storage.
    pub api_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Per-profile polling settings, replacing the global table when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling: Option<PollingConfig>,
}

/// Everything needed to talk to one control plane, resolved once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: String,
    pub api_url: String,
    pub api_token: String,
    pub defaults: LocationDefaults,
    pub polling: PollingConfig,
}

impl Profile {
    /// Provider-level location defaults declared by this profile
    pub fn location_defaults(&self) -> Result<LocationDefaults> {
        let region = match (&self.provider, &self.region) {
            (Some(provider), Some(region)) => Some(Region::new(provider, region)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::InvalidValue {
                    field: "region".to_string(),
                    reason: "'provider' is set but 'region' is missing".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::InvalidValue {
                    field: "provider".to_string(),
                    reason: "'region' is set but 'provider' is missing".to_string(),
                });
            }
        };

        Ok(LocationDefaults {
            organization_id: self.organization_id.clone(),
            project_id: self.project_id.clone(),
            region,
        })
    }

    /// Resolve the API token (environment override, then keyring, then plaintext)
    pub fn resolve_api_token(&self) -> Result<String> {
        resolve_secret(&self.api_token, Some(API_TOKEN_ENV)).map_err(|e| {
            ConfigError::CredentialError(format!("Failed to resolve API token: {}", e))
        })
    }
}

impl Config {
    /// Pick the profile name to use
    ///
    /// Resolution order: explicit name, `default_profile`, then the first
    /// profile in alphabetical order.
    pub fn resolve_profile_name(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(name) = explicit_profile {
            return Ok(name.to_string());
        }

        if let Some(ref default) = self.default_profile {
            return Ok(default.clone());
        }

        let mut names: Vec<_> = self.profiles.keys().collect();
        names.sort();
        match names.first() {
            Some(name) => Ok((*name).clone()),
            None => Err(ConfigError::NoProfiles {
                path: Self::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "the config file".to_string()),
            }),
        }
    }

    /// Resolve a profile into the settings object handed to the engine
    pub fn settings(&self, explicit_profile: Option<&str>) -> Result<Settings> {
        let name = self.resolve_profile_name(explicit_profile)?;
        let profile = self
            .profiles
            .get(&name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.clone() })?;

        let api_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| profile.api_url.clone());
        url::Url::parse(&api_url).map_err(|e| ConfigError::InvalidValue {
            field: "api_url".to_string(),
            reason: e.to_string(),
        })?;

        let polling = profile
            .polling
            .clone()
            .unwrap_or_else(|| self.polling.clone());
        polling.validate()?;

        Ok(Settings {
            profile: name.clone(),
            api_url,
            api_token: profile.resolve_api_token()?,
            defaults: profile.location_defaults()?,
            polling,
        })
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        let expanded_content = Self::expand_env_vars(&content);
        let config: Config = toml::from_str(&expanded_content)?;

        Ok(config)
    }

    /// Set or update a profile
    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Get the path to the configuration file
    ///
    /// On Linux: ~/.config/provisionctl/config.toml
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "provisionctl", "provisionctl")
            .ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand `${VAR}` and `${VAR:-default}` references
    ///
    /// Unset variables without a default are left as-is so that profiles that
    /// are never used do not need their variables set.
    fn expand_env_vars(content: &str) -> String {
        shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok())
            .to_string()
    }
}

fn default_api_url() -> String {
    "https://api.provisionctl.io/v1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            api_url: "https://api.example.test/v1".to_string(),
            api_token: "tok".to_string(),
            organization_id: Some("org-1".to_string()),
            project_id: Some("proj-1".to_string()),
            provider: Some("aws".to_string()),
            region: Some("us-east-1".to_string()),
            polling: None,
        }
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.set_profile("test".to_string(), profile());
        config.default_profile = Some("test".to_string());

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.default_profile, deserialized.default_profile);
        assert_eq!(deserialized.profiles.get("test"), Some(&profile()));
    }

    #[test]
    fn test_profile_name_resolution_order() {
        let mut config = Config::default();
        config.set_profile("zeta".to_string(), profile());
        config.set_profile("alpha".to_string(), profile());

        assert_eq!(config.resolve_profile_name(Some("zeta")).unwrap(), "zeta");
        assert_eq!(config.resolve_profile_name(None).unwrap(), "alpha");

        config.default_profile = Some("zeta".to_string());
        assert_eq!(config.resolve_profile_name(None).unwrap(), "zeta");
    }

    #[test]
    fn test_no_profiles_is_an_error() {
        let config = Config::default();
        assert!(matches!(
            config.resolve_profile_name(None),
            Err(ConfigError::NoProfiles { .. })
        ));
    }

    #[test]
    fn test_half_specified_region_is_rejected() {
        let mut p = profile();
        p.region = None;
        let err = p.location_defaults().unwrap_err();
        assert!(err.to_string().contains("region"));
    }

    #[test]
    #[serial_test::serial]
    fn test_settings_prefer_profile_polling() {
        unsafe {
            std::env::remove_var(API_TOKEN_ENV);
            std::env::remove_var(API_URL_ENV);
        }

        let mut config = Config::default();
        let mut p = profile();
        p.polling = Some(PollingConfig {
            poll_interval_secs: 1,
            ..PollingConfig::default()
        });
        config.set_profile("fast".to_string(), p);
        config.set_profile("slow".to_string(), profile());

        let fast = config.settings(Some("fast")).unwrap();
        let slow = config.settings(Some("slow")).unwrap();

        assert_eq!(fast.polling.poll_interval_secs, 1);
        assert_eq!(slow.polling.poll_interval_secs, 5);
        assert_eq!(slow.api_token, "tok");
        assert_eq!(
            slow.defaults.region,
            Some(Region::new("aws", "us-east-1"))
        );
    }

    #[test]
    fn test_unknown_profile() {
        let config = Config::default();
        assert!(matches!(
            config.settings(Some("missing")),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_expansion_with_defaults() {
        unsafe {
            std::env::set_var("PROVISIONCTL_TEST_ORG", "org-from-env");
            std::env::remove_var("PROVISIONCTL_TEST_MISSING");
        }

        let content = r#"
[profiles.test]
api_token = "${PROVISIONCTL_TEST_MISSING:-fallback-token}"
organization_id = "${PROVISIONCTL_TEST_ORG}"
"#;

        let expanded = Config::expand_env_vars(content);
        assert!(expanded.contains("org-from-env"));
        assert!(expanded.contains("fallback-token"));

        unsafe {
            std::env::remove_var("PROVISIONCTL_TEST_ORG");
        }
    }
}
