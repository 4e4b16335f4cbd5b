//! HTTP gateway for ragent.
//!
//! Exposes the agent (`POST /agent/message`), session inspection, the tool
//! list and semantic search over the configured retriever.
//!
//! Built on Axum.

pub mod api;

use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use ragent_agent::AgentLoop;
use ragent_config::{AppConfig, SessionConfig};
use ragent_core::Retriever;
use ragent_memory::{SessionSnapshot, SessionStore};
use serde::Serialize;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<AgentLoop>,
    pub retriever: Arc<dyn Retriever>,
    /// Default result count for `/rag/semantic-search`
    pub top_k: usize,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/agent/message", post(api::message_handler))
        .route("/agent/tools", get(api::list_tools_handler))
        .route(
            "/agent/sessions/{id}",
            get(api::get_session_handler).delete(api::clear_session_handler),
        )
        .route("/rag/semantic-search", post(api::semantic_search_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the session store, restoring the snapshot when one exists.
pub fn restore_sessions(config: &SessionConfig) -> SessionStore {
    let Some(path) = config.snapshot_path.as_deref().filter(|p| p.exists()) else {
        return SessionStore::new(config.capacity);
    };

    match SessionSnapshot::load(path) {
        Ok(snapshot) => {
            info!(
                path = %path.display(),
                events = snapshot.event_count(),
                "Restored session snapshot"
            );
            SessionStore::restore(config.capacity, snapshot)
        }
        Err(e) => {
            warn!(path = %path.display(), "Ignoring unreadable session snapshot: {e}");
            SessionStore::new(config.capacity)
        }
    }
}

/// Write every session to `path`.
pub fn export_sessions(store: &SessionStore, path: &Path) {
    let snapshot = store.export();
    match snapshot.save(path) {
        Ok(()) => info!(
            path = %path.display(),
            sessions = store.session_count(),
            "Saved session snapshot"
        ),
        Err(e) => warn!(path = %path.display(), "Failed to save session snapshot: {e}"),
    }
}

/// Start the gateway HTTP server.
///
/// Runs until Ctrl-C, then exports sessions if `session.snapshot_path` is
/// set.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let gateway = ragent_providers::build_from_config(&config)?;
    let tools = Arc::new(ragent_tools::default_registry(&config.tools)?);
    let retriever = ragent_providers::build_retriever(&config.retrieval)?;
    let sessions = Arc::new(restore_sessions(&config.session));

    let agent = AgentLoop::from_config(gateway, tools, sessions.clone(), &config.agent)
        .with_retriever(retriever.clone())
        .with_top_k(config.retrieval.top_k);

    let state = Arc::new(GatewayState {
        agent: Arc::new(agent),
        retriever,
        top_k: config.retrieval.top_k,
    });
    let app = build_router(state, config.gateway.body_limit_bytes);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(path) = &config.session.snapshot_path {
        export_sessions(&sessions, path);
    }
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn ping_handler() -> &'static str {
    "pong"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
