//! Secret resolution with optional keyring support
//!
//! A configured secret is resolved in this order:
//! 1. The override environment variable, when one is given and set
//! 2. The OS keyring, when the value is a `keyring:<name>` reference
//! 3. The value itself, as plaintext

use super::error::{ConfigError, Result};
use std::env;

/// Prefix that indicates a value should be retrieved from the keyring
pub const KEYRING_PREFIX: &str = "keyring:";

/// Service name for keyring entries
#[cfg(feature = "secure-storage")]
const SERVICE_NAME: &str = "provisionctl";

/// Check if a value is a keyring reference
pub fn is_keyring_reference(value: &str) -> bool {
    value.starts_with(KEYRING_PREFIX)
}

/// Resolve a configured secret to its actual value
pub fn resolve_secret(value: &str, env_var: Option<&str>) -> Result<String> {
    if let Some(var) = env_var
        && let Ok(env_value) = env::var(var)
    {
        return Ok(env_value);
    }

    let Some(key) = value.strip_prefix(KEYRING_PREFIX) else {
        return Ok(value.to_string());
    };

    #[cfg(feature = "secure-storage")]
    {
        let entry = keyring::Entry::new(SERVICE_NAME, key)
            .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
        entry.get_password().map_err(|e| {
            ConfigError::KeyringError(format!(
                "Failed to retrieve credential '{}' from keyring: {}",
                key, e
            ))
        })
    }
    #[cfg(not(feature = "secure-storage"))]
    {
        Err(ConfigError::CredentialError(format!(
            "'{}' references the keyring but the secure-storage feature is not enabled",
            key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_value_is_returned_as_is() {
        assert_eq!(resolve_secret("tok-123", None).unwrap(), "tok-123");
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_override() {
        unsafe {
            env::set_var("PROVISIONCTL_TEST_TOKEN", "env-token");
        }

        let resolved = resolve_secret("config-token", Some("PROVISIONCTL_TEST_TOKEN")).unwrap();
        assert_eq!(resolved, "env-token");

        unsafe {
            env::remove_var("PROVISIONCTL_TEST_TOKEN");
        }
    }

    #[test]
    fn test_keyring_reference_detection() {
        assert!(is_keyring_reference("keyring:prod-token"));
        assert!(!is_keyring_reference("prod-token"));
        assert!(!is_keyring_reference(""));
    }

    #[cfg(not(feature = "secure-storage"))]
    #[test]
    fn test_keyring_reference_without_feature_fails() {
        let err = resolve_secret("keyring:prod-token", None).unwrap_err();
        assert!(err.to_string().contains("secure-storage"));
    }
}
