//! # octofhir-launch
//!
//! SMART on FHIR EHR launch handshake for OctoFHIR client applications.
//!
//! This crate provides:
//! - SMART configuration discovery (`/.well-known/smart-configuration`)
//! - Authorization request construction with an anti-forgery `state`
//! - Callback `state` verification
//! - Per-browser launch session storage, with renders of one session serialized
//! - The launch handler state machine tying it all together
//!
//! ## Overview
//!
//! An EHR launches the application with `iss` and `launch` query parameters.
//! The handler remembers them in the browser's [`LaunchSession`], discovers
//! the EHR's authorization endpoint from `iss`, and produces an authorization
//! URL the user follows. When the EHR redirects back with `code` and `state`,
//! the handler checks `state` against the value committed to the session
//! before the code is shown.
//!
//! ## Modules
//!
//! - [`config`] - Client registration settings (client id, redirect URI, scope)
//! - [`discovery`] - SMART configuration discovery client
//! - [`authorize`] - Authorization request and state token handling
//! - [`session`] - Launch session model and storage
//! - [`handler`] - Launch handler state machine
//! - [`error`] - Error taxonomy

pub mod authorize;
pub mod config;
pub mod discovery;
pub mod error;
pub mod handler;
pub mod session;

pub use authorize::{AuthorizationRequest, generate_state, verify_state};
pub use config::{ClientConfig, ConfigError, DEFAULT_SCOPE};
pub use discovery::{
    SmartConfiguration, SmartConfigurationSource, SmartDiscoveryClient, discovery_url,
};
pub use error::{ErrorCategory, LaunchError};
pub use handler::{LaunchEvent, LaunchHandler, LaunchParams, LaunchView, Step};
pub use session::{
    InMemorySessionStore, LaunchSession, SessionGuard, SessionId, SessionLocks, SessionStore,
};

/// Type alias for launch flow results.
pub type LaunchResult<T> = Result<T, LaunchError>;
