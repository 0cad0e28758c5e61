use std::{net::SocketAddr, sync::Arc};

use axum::{Router, routing::get};
use octofhir_launch::{
    InMemorySessionStore, LaunchHandler, SessionLocks, SessionStore, SmartDiscoveryClient,
};
use tower_http::trace::TraceLayer;

use crate::{
    config::{AppConfig, SessionConfig},
    handlers,
};

/// Shared state for the launch routes.
#[derive(Clone)]
pub struct AppState {
    pub handler: LaunchHandler,
    pub sessions: Arc<dyn SessionStore>,
    /// Held by a render from session load through save
    pub locks: Arc<SessionLocks>,
    pub session: Arc<SessionConfig>,
}

impl AppState {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let discovery = SmartDiscoveryClient::from_config(&cfg.client)?;
        Ok(Self {
            handler: LaunchHandler::new(cfg.client.clone(), Arc::new(discovery)),
            sessions: Arc::new(InMemorySessionStore::new(cfg.session.ttl)),
            locks: Arc::new(SessionLocks::new()),
            session: Arc::new(cfg.session.clone()),
        })
    }
}

pub struct LaunchServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::launch_page))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    // Query strings carry launch tokens and codes; log the path only
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<LaunchServer> {
        let app = build_app(&self.config)?;

        Ok(LaunchServer {
            addr: self.addr,
            app,
        })
    }
}

impl LaunchServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
