//! Configuration and profile management
//!
//! - Multiple named profiles, each pointing at one control plane
//! - Provider-level location defaults per profile
//! - Polling and retry tunables, global or per profile
//! - Secure credential storage using OS keyring (optional)
//! - Environment variable expansion in config files

#![allow(clippy::module_inception)]

pub mod config;
pub mod credential;
pub mod error;
pub mod polling;

pub use config::{API_TOKEN_ENV, API_URL_ENV, Config, Profile, Settings};
pub use error::ConfigError;
pub use polling::PollingConfig;
