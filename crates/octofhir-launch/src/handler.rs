//! Launch handler state machine.
//!
//! Each render classifies its query parameters into a [`LaunchEvent`] and
//! evaluates it against the browser's [`LaunchSession`]. Phases are tried in
//! priority order and the first match wins:
//!
//! 1. Callback: `code` and `state` present. Verify `state`, show the code.
//! 2. Launch: `iss` and `launch` present and no `iss` in the session yet.
//!    Reset the session, store the launch context, then re-evaluate.
//! 3. Login: `iss` in the session. Discover the authorization endpoint,
//!    ensure a `state`, build the authorization URL.
//! 4. Idle: nothing to do yet.
//!
//! ```text
//! Idle -> (launch) -> AwaitingLogin -> (EHR redirect) -> CallbackVerified
//!                                                     \-> CallbackRejected
//! ```
//!
//! `AwaitingLogin` is re-entered on every render until the user leaves.
//! `CallbackRejected` is terminal: the flow must be restarted by the EHR.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::authorize::{AuthorizationRequest, generate_state, verify_state};
use crate::config::ClientConfig;
use crate::discovery::SmartConfigurationSource;
use crate::error::LaunchError;
use crate::session::LaunchSession;

/// Upper bound on handler passes for a single render.
///
/// A launch transitions at most once, so two passes always suffice.
const MAX_PASSES: usize = 3;

/// Raw query parameters of a render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LaunchParams {
    /// Issuer (FHIR server base URL) from an EHR launch.
    #[serde(default)]
    pub iss: Option<String>,
    /// Launch token from an EHR launch.
    #[serde(default)]
    pub launch: Option<String>,
    /// Authorization code from the OAuth 2.0 callback.
    #[serde(default)]
    pub code: Option<String>,
    /// State echoed by the OAuth 2.0 callback.
    #[serde(default)]
    pub state: Option<String>,
}

/// What the incoming request carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    /// Redirect back from the authorization server.
    Callback {
        /// Authorization code.
        code: String,
        /// Echoed state.
        state: String,
    },
    /// Launch from the EHR.
    Launch {
        /// FHIR server base URL.
        iss: String,
        /// Opaque launch token.
        launch: String,
    },
    /// No launch or callback parameters.
    None,
}

impl From<LaunchParams> for LaunchEvent {
    fn from(params: LaunchParams) -> Self {
        // Callback parameters take priority over launch parameters
        match params {
            LaunchParams {
                code: Some(code),
                state: Some(state),
                ..
            } => Self::Callback { code, state },
            LaunchParams {
                iss: Some(iss),
                launch: Some(launch),
                ..
            } => Self::Launch { iss, launch },
            _ => Self::None,
        }
    }
}

/// Stable result of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchView {
    /// No launch context yet.
    Waiting,
    /// Authorization URL ready for the user to follow.
    ReadyToAuthorize {
        /// Full authorization URL.
        authorize_url: Url,
    },
    /// Callback state matched.
    CallbackVerified {
        /// Authorization code, shown verbatim.
        code: String,
    },
    /// Callback state did not match the session.
    CallbackRejected {
        /// State stored in the session, if any.
        expected: Option<String>,
        /// State received in the callback.
        received: String,
    },
    /// The render failed and the flow halts here.
    Failed {
        /// Why.
        error: LaunchError,
    },
}

impl LaunchView {
    /// Short phase name for logs.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Waiting => "idle",
            Self::ReadyToAuthorize { .. } => "awaiting_login",
            Self::CallbackVerified { .. } => "callback_verified",
            Self::CallbackRejected { .. } => "callback_rejected",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Outcome of one handler pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The session changed; evaluate the same event again.
    Transition,
    /// A stable view was reached.
    Render(LaunchView),
}

/// Drives a SMART EHR launch for one browser session at a time.
#[derive(Clone)]
pub struct LaunchHandler {
    client: ClientConfig,
    discovery: Arc<dyn SmartConfigurationSource>,
    state_generator: fn() -> String,
}

impl LaunchHandler {
    /// Creates a handler with the given client settings and discovery source.
    pub fn new(client: ClientConfig, discovery: Arc<dyn SmartConfigurationSource>) -> Self {
        Self {
            client,
            discovery,
            state_generator: generate_state,
        }
    }

    /// Replaces the `state` generator.
    #[must_use]
    pub fn with_state_generator(mut self, generator: fn() -> String) -> Self {
        self.state_generator = generator;
        self
    }

    /// Returns the client settings.
    #[must_use]
    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    /// Evaluates `event` against `session` until a stable view is reached.
    pub async fn handle(&self, event: &LaunchEvent, session: &mut LaunchSession) -> LaunchView {
        for _ in 0..MAX_PASSES {
            if let Step::Render(view) = self.step(event, session).await {
                tracing::debug!(phase = view.phase(), "Launch render complete");
                return view;
            }
        }

        tracing::error!(passes = MAX_PASSES, "Launch handler did not settle");
        LaunchView::Failed {
            error: LaunchError::internal("launch handler did not reach a stable phase"),
        }
    }

    /// Performs a single handler pass.
    pub async fn step(&self, event: &LaunchEvent, session: &mut LaunchSession) -> Step {
        match event {
            LaunchEvent::Callback { code, state } => Step::Render(self.callback(code, state, session)),
            LaunchEvent::Launch { iss, launch } if session.iss.is_none() => {
                tracing::info!(iss = %iss, "EHR launch received");
                session.begin_launch(iss.as_str(), launch.as_str());
                Step::Transition
            }
            _ if session.iss.is_some() => Step::Render(self.login(session).await),
            _ => Step::Render(LaunchView::Waiting),
        }
    }

    fn callback(&self, code: &str, state: &str, session: &LaunchSession) -> LaunchView {
        match verify_state(session.state.as_deref(), state) {
            Ok(()) => {
                tracing::info!("Authorization callback state verified");
                LaunchView::CallbackVerified {
                    code: code.to_string(),
                }
            }
            Err(LaunchError::StateMismatch { expected, received }) => {
                tracing::warn!(
                    has_stored_state = expected.is_some(),
                    "Authorization callback state mismatch"
                );
                LaunchView::CallbackRejected { expected, received }
            }
            Err(error) => LaunchView::Failed { error },
        }
    }

    async fn login(&self, session: &mut LaunchSession) -> LaunchView {
        let iss = session.iss.clone().unwrap_or_default();

        let configuration = match self.discovery.fetch(&iss).await {
            Ok(c) => c,
            Err(error) => {
                tracing::warn!(iss = %iss, error = %error, "SMART configuration unavailable");
                return LaunchView::Failed { error };
            }
        };

        let endpoint = match configuration.authorization_endpoint_url(&iss) {
            Ok(e) => e,
            Err(error) => {
                tracing::warn!(iss = %iss, error = %error, "SMART configuration unusable");
                return LaunchView::Failed { error };
            }
        };

        // Commit state to the session before it goes into any URL
        let state = session
            .state_or_insert_with(self.state_generator)
            .to_string();
        let launch = session.launch.clone().unwrap_or_default();

        let request = AuthorizationRequest::new(&self.client, iss, launch, state);
        LaunchView::ReadyToAuthorize {
            authorize_url: request.build_url(&endpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::LaunchResult;
    use crate::discovery::SmartConfiguration;

    /// Discovery source returning canned results and recording requested issuers.
    struct StubDiscovery {
        result: LaunchResult<SmartConfiguration>,
        calls: Mutex<Vec<String>>,
    }

    impl StubDiscovery {
        fn with_endpoint(endpoint: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(SmartConfiguration {
                    authorization_endpoint: Some(endpoint.to_string()),
                    ..Default::default()
                }),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: LaunchError) -> Arc<Self> {
            Arc::new(Self {
                result: Err(error),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SmartConfigurationSource for StubDiscovery {
        async fn fetch(&self, issuer: &str) -> LaunchResult<SmartConfiguration> {
            self.calls.lock().unwrap().push(issuer.to_string());
            self.result.clone()
        }
    }

    fn handler(discovery: Arc<StubDiscovery>) -> LaunchHandler {
        LaunchHandler::new(ClientConfig::default(), discovery)
    }

    fn launch_event() -> LaunchEvent {
        LaunchEvent::Launch {
            iss: "https://ehr.example".to_string(),
            launch: "abc123".to_string(),
        }
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_event_from_params() {
        let params = LaunchParams {
            iss: Some("https://ehr.example".to_string()),
            launch: Some("abc123".to_string()),
            ..Default::default()
        };
        assert_eq!(LaunchEvent::from(params), launch_event());

        // Callback wins when everything is present
        let params = LaunchParams {
            iss: Some("https://ehr.example".to_string()),
            launch: Some("abc123".to_string()),
            code: Some("xyz".to_string()),
            state: Some("S1".to_string()),
        };
        assert_eq!(
            LaunchEvent::from(params),
            LaunchEvent::Callback {
                code: "xyz".to_string(),
                state: "S1".to_string()
            }
        );

        // Half a callback or half a launch is no event
        let params = LaunchParams {
            code: Some("xyz".to_string()),
            ..Default::default()
        };
        assert_eq!(LaunchEvent::from(params), LaunchEvent::None);
        let params = LaunchParams {
            iss: Some("https://ehr.example".to_string()),
            ..Default::default()
        };
        assert_eq!(LaunchEvent::from(params), LaunchEvent::None);
    }

    #[tokio::test]
    async fn test_idle_without_launch() {
        let discovery = StubDiscovery::with_endpoint("https://ehr.example/auth");
        let handler = handler(discovery.clone());
        let mut session = LaunchSession::default();

        let view = handler.handle(&LaunchEvent::None, &mut session).await;

        assert_eq!(view, LaunchView::Waiting);
        assert!(session.is_empty());
        assert!(discovery.calls().is_empty());
    }

    #[tokio::test]
    async fn test_launch_step_stores_context_without_state() {
        let handler = handler(StubDiscovery::with_endpoint("https://ehr.example/auth"));
        let mut session = LaunchSession {
            state: Some("stale".to_string()),
            ..Default::default()
        };

        let step = handler.step(&launch_event(), &mut session).await;

        assert_eq!(step, Step::Transition);
        assert_eq!(
            session,
            LaunchSession {
                iss: Some("https://ehr.example".to_string()),
                launch: Some("abc123".to_string()),
                state: None,
            }
        );
    }

    #[tokio::test]
    async fn test_launch_builds_authorization_url() {
        let discovery = StubDiscovery::with_endpoint("https://ehr.example/auth");
        let handler = handler(discovery.clone()).with_state_generator(|| "S1".to_string());
        let mut session = LaunchSession::default();

        let view = handler.handle(&launch_event(), &mut session).await;

        let authorize_url = match view {
            LaunchView::ReadyToAuthorize { authorize_url } => authorize_url,
            other => panic!("expected ReadyToAuthorize, got {other:?}"),
        };
        assert!(authorize_url.as_str().starts_with("https://ehr.example/auth?"));

        let params = query(&authorize_url);
        assert_eq!(params.len(), 7);
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], handler.client().client_id);
        assert_eq!(params["redirect_uri"], "http://localhost:8501/");
        assert_eq!(params["scope"], handler.client().scope);
        assert_eq!(params["launch"], "abc123");
        assert_eq!(params["state"], "S1");
        assert_eq!(params["aud"], "https://ehr.example");

        assert_eq!(session.state.as_deref(), Some("S1"));
        assert_eq!(discovery.calls(), vec!["https://ehr.example".to_string()]);
    }

    #[tokio::test]
    async fn test_state_stable_across_renders() {
        let discovery = StubDiscovery::with_endpoint("https://ehr.example/auth");
        let handler = handler(discovery.clone());
        let mut session = LaunchSession::default();

        let first = handler.handle(&launch_event(), &mut session).await;
        // Re-render with the launch parameters still in the URL
        let second = handler.handle(&launch_event(), &mut session).await;
        // Re-render without parameters
        let third = handler.handle(&LaunchEvent::None, &mut session).await;

        let states: Vec<String> = [first, second, third]
            .iter()
            .map(|view| match view {
                LaunchView::ReadyToAuthorize { authorize_url } => {
                    query(authorize_url)["state"].clone()
                }
                other => panic!("expected ReadyToAuthorize, got {other:?}"),
            })
            .collect();

        assert_eq!(states[0], states[1]);
        assert_eq!(states[1], states[2]);
        assert_eq!(session.state.as_deref(), Some(states[0].as_str()));
        // Configuration is fetched on every render
        assert_eq!(discovery.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_new_launch_while_active_is_ignored() {
        let handler = handler(StubDiscovery::with_endpoint("https://ehr.example/auth"));
        let mut session = LaunchSession::default();
        handler.handle(&launch_event(), &mut session).await;
        let state = session.state.clone();

        let other = LaunchEvent::Launch {
            iss: "https://other.example".to_string(),
            launch: "zzz".to_string(),
        };
        handler.handle(&other, &mut session).await;

        assert_eq!(session.iss.as_deref(), Some("https://ehr.example"));
        assert_eq!(session.launch.as_deref(), Some("abc123"));
        assert_eq!(session.state, state);
    }

    #[tokio::test]
    async fn test_callback_verified() {
        let handler = handler(StubDiscovery::with_endpoint("https://ehr.example/auth"));
        let mut session = LaunchSession {
            iss: Some("https://ehr.example".to_string()),
            launch: Some("abc123".to_string()),
            state: Some("S1".to_string()),
        };
        let event = LaunchEvent::Callback {
            code: "xyz".to_string(),
            state: "S1".to_string(),
        };

        let view = handler.handle(&event, &mut session).await;

        assert_eq!(
            view,
            LaunchView::CallbackVerified {
                code: "xyz".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_callback_state_mismatch() {
        let discovery = StubDiscovery::with_endpoint("https://ehr.example/auth");
        let handler = handler(discovery.clone());
        let mut session = LaunchSession {
            iss: Some("https://ehr.example".to_string()),
            launch: Some("abc123".to_string()),
            state: Some("S1".to_string()),
        };
        let event = LaunchEvent::Callback {
            code: "xyz".to_string(),
            state: "WRONG".to_string(),
        };

        let view = handler.handle(&event, &mut session).await;

        assert_eq!(
            view,
            LaunchView::CallbackRejected {
                expected: Some("S1".to_string()),
                received: "WRONG".to_string(),
            }
        );
        assert!(discovery.calls().is_empty());
    }

    #[tokio::test]
    async fn test_callback_without_session_state_is_rejected() {
        let handler = handler(StubDiscovery::with_endpoint("https://ehr.example/auth"));
        let mut session = LaunchSession::default();
        let event = LaunchEvent::Callback {
            code: "xyz".to_string(),
            state: "S1".to_string(),
        };

        let view = handler.handle(&event, &mut session).await;

        assert!(matches!(
            view,
            LaunchView::CallbackRejected { expected: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_discovery_failure_halts_without_url() {
        let error = LaunchError::HttpStatus {
            url: "https://ehr.example/.well-known/smart-configuration".to_string(),
            status: 500,
        };
        let handler = handler(StubDiscovery::failing(error.clone()));
        let mut session = LaunchSession::default();

        let view = handler.handle(&launch_event(), &mut session).await;

        assert_eq!(view, LaunchView::Failed { error });
        // No URL was built, so no state was committed either
        assert!(session.state.is_none());
        assert_eq!(session.iss.as_deref(), Some("https://ehr.example"));
    }

    #[tokio::test]
    async fn test_missing_authorization_endpoint() {
        let discovery = Arc::new(StubDiscovery {
            result: Ok(SmartConfiguration::default()),
            calls: Mutex::new(Vec::new()),
        });
        let handler = handler(discovery);
        let mut session = LaunchSession::default();

        let view = handler.handle(&launch_event(), &mut session).await;

        assert!(matches!(
            view,
            LaunchView::Failed {
                error: LaunchError::MissingAuthorizationEndpoint { .. }
            }
        ));
        assert!(session.state.is_none());
    }

    #[test]
    fn test_view_phase_names() {
        assert_eq!(LaunchView::Waiting.phase(), "idle");
        assert_eq!(
            LaunchView::CallbackVerified {
                code: "x".to_string()
            }
            .phase(),
            "callback_verified"
        );
    }
}
