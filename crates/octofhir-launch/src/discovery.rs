//! SMART configuration discovery.
//!
//! Fetches the EHR's `/.well-known/smart-configuration` document to find its
//! OAuth 2.0 authorization endpoint.
//!
//! The document is untrusted input. Apart from JSON well-formedness, the only
//! thing checked is that `authorization_endpoint` is present and usable. The
//! document is fetched fresh on every call and never cached.
//!
//! # References
//!
//! - [SMART Configuration](https://build.fhir.org/ig/HL7/smart-app-launch/conformance.html)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::LaunchResult;
use crate::config::ClientConfig;
use crate::error::LaunchError;

/// Path appended to the issuer URL to locate the SMART configuration.
pub const SMART_CONFIGURATION_PATH: &str = "/.well-known/smart-configuration";

/// Largest configuration document accepted (1 MB).
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// SMART configuration document as published by an EHR.
///
/// Only the fields this application reads are typed; everything else is
/// kept in [`SmartConfiguration::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartConfiguration {
    /// Issuer URL, when the server supports OpenID Connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// URL of the OAuth 2.0 authorization endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// URL of the OAuth 2.0 token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// SMART capabilities advertised by the server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    /// Remaining members of the document.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SmartConfiguration {
    /// Returns the authorization endpoint as a URL.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::MissingAuthorizationEndpoint` if the field is
    /// absent or empty, and `LaunchError::InvalidAuthorizationEndpoint` if it
    /// is not an absolute URL.
    pub fn authorization_endpoint_url(&self, issuer: &str) -> LaunchResult<Url> {
        let endpoint = match self.authorization_endpoint.as_deref() {
            Some(e) if !e.trim().is_empty() => e,
            _ => {
                return Err(LaunchError::MissingAuthorizationEndpoint {
                    issuer: issuer.to_string(),
                });
            }
        };

        Url::parse(endpoint)
            .map_err(|e| LaunchError::invalid_authorization_endpoint(endpoint, e.to_string()))
    }
}

/// Builds the discovery URL for an issuer.
///
/// Trailing slashes on the issuer are dropped before the well-known path is
/// appended, so `https://ehr.example/fhir/` and `https://ehr.example/fhir`
/// both resolve to `https://ehr.example/fhir/.well-known/smart-configuration`.
///
/// # Errors
///
/// Returns `LaunchError::EmptyIssuer` for an empty issuer and
/// `LaunchError::InvalidIssuer` if the result is not an `http`/`https` URL.
pub fn discovery_url(issuer: &str) -> LaunchResult<Url> {
    if issuer.is_empty() {
        return Err(LaunchError::EmptyIssuer);
    }

    let raw = format!(
        "{}{}",
        issuer.trim_end_matches('/'),
        SMART_CONFIGURATION_PATH
    );
    let url = Url::parse(&raw)
        .map_err(|e| LaunchError::invalid_issuer(format!("'{}': {}", issuer, e)))?;

    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(LaunchError::invalid_issuer(format!(
            "'{}': unsupported scheme '{}'",
            issuer, other
        ))),
    }
}

/// Source of SMART configuration documents.
///
/// The launch handler depends on this trait rather than on an HTTP client so
/// that tests can supply documents directly.
#[async_trait]
pub trait SmartConfigurationSource: Send + Sync {
    /// Fetches the SMART configuration published under `issuer`.
    async fn fetch(&self, issuer: &str) -> LaunchResult<SmartConfiguration>;
}

/// HTTP client for SMART configuration discovery.
///
/// Every call performs exactly one GET bounded by the configured timeout.
/// Failures are returned as-is; there is no retry.
#[derive(Debug, Clone)]
pub struct SmartDiscoveryClient {
    http_client: reqwest::Client,
}

impl SmartDiscoveryClient {
    /// Creates a discovery client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::Internal` if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> LaunchResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LaunchError::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { http_client })
    }

    /// Creates a discovery client using the configured discovery timeout.
    pub fn from_config(config: &ClientConfig) -> LaunchResult<Self> {
        Self::new(config.discovery_timeout)
    }

    /// Fetches and parses the SMART configuration for `issuer`.
    ///
    /// # Errors
    ///
    /// - `EmptyIssuer` / `InvalidIssuer` when no discovery URL can be built
    /// - `Timeout` when the request exceeds the timeout
    /// - `Network` on other transport failures
    /// - `HttpStatus` on a non-2xx response
    /// - `InvalidDocument` when the body is not a JSON object or is too large
    pub async fn discover(&self, issuer: &str) -> LaunchResult<SmartConfiguration> {
        let url = discovery_url(issuer)?;

        tracing::debug!(url = %url, "Fetching SMART configuration");

        let response = self
            .http_client
            .get(url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "SMART configuration request failed");
            return Err(LaunchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_RESPONSE_SIZE
        {
            return Err(LaunchError::invalid_document(
                url.as_str(),
                format!("response exceeds maximum size of {MAX_RESPONSE_SIZE} bytes"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let document: SmartConfiguration = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Failed to parse SMART configuration");
            LaunchError::invalid_document(url.as_str(), e.to_string())
        })?;

        tracing::debug!(
            url = %url,
            has_authorization_endpoint = document.authorization_endpoint.is_some(),
            "Fetched SMART configuration"
        );

        Ok(document)
    }
}

#[async_trait]
impl SmartConfigurationSource for SmartDiscoveryClient {
    async fn fetch(&self, issuer: &str) -> LaunchResult<SmartConfiguration> {
        self.discover(issuer).await
    }
}

fn transport_error(url: &Url, e: reqwest::Error) -> LaunchError {
    if e.is_timeout() {
        tracing::warn!(url = %url, "SMART configuration request timed out");
        LaunchError::Timeout {
            url: url.to_string(),
        }
    } else {
        tracing::warn!(url = %url, error = %e, "Failed to fetch SMART configuration");
        LaunchError::network(url.as_str(), e.to_string())
    }
}
