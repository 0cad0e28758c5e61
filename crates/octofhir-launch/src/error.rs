//! Launch flow error types.
//!
//! Every error is scoped to a single render: it is shown to the user and
//! the flow halts for that request, but nothing here is fatal to the
//! hosting process.

use std::fmt;

/// Errors that can occur while driving a SMART launch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    /// The issuer URL from the launch is empty.
    #[error("ISS URL is empty")]
    EmptyIssuer,

    /// The issuer URL from the launch cannot be used to build a discovery URL.
    #[error("Invalid issuer URL: {message}")]
    InvalidIssuer {
        /// Description of why the issuer is invalid.
        message: String,
    },

    /// A transport error occurred while fetching the SMART configuration.
    #[error("Error fetching SMART configuration from {url}: {message}")]
    Network {
        /// The discovery URL that was requested.
        url: String,
        /// Description of the transport failure.
        message: String,
    },

    /// The SMART configuration request did not complete in time.
    #[error("Timed out fetching SMART configuration from {url}")]
    Timeout {
        /// The discovery URL that was requested.
        url: String,
    },

    /// The SMART configuration endpoint returned a non-success status.
    #[error("SMART configuration request to {url} failed with HTTP status {status}")]
    HttpStatus {
        /// The discovery URL that was requested.
        url: String,
        /// The HTTP status code returned.
        status: u16,
    },

    /// The SMART configuration body is not a JSON object.
    #[error("Malformed SMART configuration from {url}: {message}")]
    InvalidDocument {
        /// The discovery URL that was requested.
        url: String,
        /// Description of the parse failure.
        message: String,
    },

    /// The SMART configuration lacks `authorization_endpoint`.
    #[error("SMART configuration for {issuer} has no authorization_endpoint")]
    MissingAuthorizationEndpoint {
        /// The issuer whose configuration was fetched.
        issuer: String,
    },

    /// The advertised `authorization_endpoint` is not a usable URL.
    #[error("Invalid authorization_endpoint '{endpoint}': {message}")]
    InvalidAuthorizationEndpoint {
        /// The endpoint value from the configuration document.
        endpoint: String,
        /// Description of why it cannot be used.
        message: String,
    },

    /// The callback `state` does not match the value stored in the session.
    #[error("State mismatch: expected {}, received {received}", .expected.as_deref().unwrap_or("<none>"))]
    StateMismatch {
        /// The state stored in the session, if any.
        expected: Option<String>,
        /// The state returned by the authorization server.
        received: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl LaunchError {
    /// Creates a new `InvalidIssuer` error.
    #[must_use]
    pub fn invalid_issuer(message: impl Into<String>) -> Self {
        Self::InvalidIssuer {
            message: message.into(),
        }
    }

    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidDocument` error.
    #[must_use]
    pub fn invalid_document(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidAuthorizationEndpoint` error.
    #[must_use]
    pub fn invalid_authorization_endpoint(
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAuthorizationEndpoint {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the error category for logging and status mapping.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyIssuer | Self::InvalidIssuer { .. } => ErrorCategory::Input,
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidDocument { .. } => ErrorCategory::Discovery,
            Self::MissingAuthorizationEndpoint { .. }
            | Self::InvalidAuthorizationEndpoint { .. } => ErrorCategory::Protocol,
            Self::StateMismatch { .. } => ErrorCategory::Security,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of launch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or unusable launch parameters.
    Input,
    /// Transport failure fetching the SMART configuration.
    Discovery,
    /// The SMART configuration is missing required data.
    Protocol,
    /// The callback failed anti-forgery verification.
    Security,
    /// Internal failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Discovery => write!(f, "discovery"),
            Self::Protocol => write!(f, "protocol"),
            Self::Security => write!(f, "security"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(LaunchError::EmptyIssuer.to_string(), "ISS URL is empty");

        let err = LaunchError::HttpStatus {
            url: "https://ehr.example/.well-known/smart-configuration".to_string(),
            status: 500,
        };
        assert_eq!(
            err.to_string(),
            "SMART configuration request to https://ehr.example/.well-known/smart-configuration failed with HTTP status 500"
        );

        let err = LaunchError::StateMismatch {
            expected: Some("S1".to_string()),
            received: "WRONG".to_string(),
        };
        assert_eq!(err.to_string(), "State mismatch: expected S1, received WRONG");

        let err = LaunchError::StateMismatch {
            expected: None,
            received: "WRONG".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "State mismatch: expected <none>, received WRONG"
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            LaunchError::invalid_issuer("nope").category(),
            ErrorCategory::Input
        );
        assert_eq!(
            LaunchError::network("u", "refused").category(),
            ErrorCategory::Discovery
        );
        assert_eq!(
            LaunchError::invalid_document("u", "eof").category(),
            ErrorCategory::Discovery
        );
        assert_eq!(
            LaunchError::MissingAuthorizationEndpoint {
                issuer: "https://ehr.example".to_string()
            }
            .category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            LaunchError::invalid_authorization_endpoint("::", "relative URL").category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            LaunchError::internal("boom").category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Input.to_string(), "input");
        assert_eq!(ErrorCategory::Discovery.to_string(), "discovery");
        assert_eq!(ErrorCategory::Protocol.to_string(), "protocol");
        assert_eq!(ErrorCategory::Security.to_string(), "security");
    }
}
