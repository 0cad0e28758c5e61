//! Client registration settings for the SMART launch.
//!
//! These values identify the application to the EHR's authorization server
//! and are the same for every launch handled by a process.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "launch openid fhirUser profile user/Patient.read user/Patient.write user/Observation.read user/Observation.write";

/// SMART client configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [client]
/// client_id = "11c867a3-5c5a-4857-9835-ca22859e7882"
/// redirect_uri = "http://localhost:8501/"
/// discovery_timeout = "10s"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// OAuth 2.0 client identifier registered with the EHR.
    pub client_id: String,

    /// Redirect URI registered with the EHR.
    /// The authorization server sends the browser back here with `code` and `state`.
    pub redirect_uri: String,

    /// Space-delimited scopes requested in the authorization request.
    pub scope: String,

    /// Upper bound on the SMART configuration fetch.
    #[serde(with = "humantime_serde")]
    pub discovery_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: "11c867a3-5c5a-4857-9835-ca22859e7882".to_string(),
            redirect_uri: "http://localhost:8501/".to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            discovery_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl ClientConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the client id or scope is empty, and
    /// `ConfigError::InvalidValue` if:
    /// - The redirect URI is not an absolute URL
    /// - The scope does not request `launch`
    /// - The discovery timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id".to_string()));
        }

        if let Err(e) = Url::parse(&self.redirect_uri) {
            return Err(ConfigError::InvalidValue(format!(
                "redirect_uri '{}' is not an absolute URL: {}",
                self.redirect_uri, e
            )));
        }

        if self.scope.trim().is_empty() {
            return Err(ConfigError::Missing("scope".to_string()));
        }

        // EHR launch requires the launch scope
        if !self.scope.split_whitespace().any(|s| s == "launch") {
            return Err(ConfigError::InvalidValue(
                "scope must include 'launch' for EHR launch".to_string(),
            ));
        }

        if self.discovery_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "discovery_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
