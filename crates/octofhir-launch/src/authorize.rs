//! Authorization request construction and `state` handling.
//!
//! The `state` parameter is the only integrity check in the launch flow: the
//! value placed in the authorization URL is committed to the session first,
//! and the callback must echo it exactly.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use url::Url;

use crate::LaunchResult;
use crate::config::ClientConfig;
use crate::error::LaunchError;

/// Number of random bytes in a generated `state` (256 bits).
pub const STATE_ENTROPY_BYTES: usize = 32;

/// OAuth 2.0 authorization request for an EHR launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Always `code`.
    pub response_type: &'static str,
    /// Registered client identifier.
    pub client_id: String,
    /// Registered redirect URI.
    pub redirect_uri: String,
    /// Space-delimited requested scopes.
    pub scope: String,
    /// Opaque launch token from the EHR.
    pub launch: String,
    /// Anti-forgery token already stored in the session.
    pub state: String,
    /// Audience: the FHIR server base URL (`iss`).
    pub aud: String,
}

impl AuthorizationRequest {
    /// Creates an authorization request for a launch.
    ///
    /// `state` must already be persisted in the session.
    #[must_use]
    pub fn new(
        client: &ClientConfig,
        issuer: impl Into<String>,
        launch: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            response_type: "code",
            client_id: client.client_id.clone(),
            redirect_uri: client.redirect_uri.clone(),
            scope: client.scope.clone(),
            launch: launch.into(),
            state: state.into(),
            aud: issuer.into(),
        }
    }

    /// Returns the request as ordered query pairs.
    #[must_use]
    pub fn query_pairs(&self) -> [(&'static str, &str); 7] {
        [
            ("response_type", self.response_type),
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
            ("scope", &self.scope),
            ("launch", &self.launch),
            ("state", &self.state),
            ("aud", &self.aud),
        ]
    }

    /// Builds the full authorization URL on `endpoint`.
    ///
    /// Values are form-urlencoded. Any query already present on the
    /// endpoint is preserved ahead of the request parameters.
    #[must_use]
    pub fn build_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut().extend_pairs(self.query_pairs());
        url
    }
}

/// Generates a new URL-safe `state` token.
///
/// 32 bytes from the thread-local CSPRNG, base64url-encoded without padding.
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_ENTROPY_BYTES];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Verifies a callback `state` against the session's stored value.
///
/// # Errors
///
/// Returns `LaunchError::StateMismatch` when nothing is stored or the values
/// differ.
pub fn verify_state(expected: Option<&str>, received: &str) -> LaunchResult<()> {
    match expected {
        Some(stored) if stored.as_bytes() == received.as_bytes() => Ok(()),
        _ => Err(LaunchError::StateMismatch {
            expected: expected.map(str::to_string),
            received: received.to_string(),
        }),
    }
}
