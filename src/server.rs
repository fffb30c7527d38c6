//! Local HTTP bridge for cross-window events.
//!
//! Panels rendered in other processes (webviews) post their pointer and
//! settings events here and read back the state they render.
//!
//! # Architecture
//!
//! ```text
//! panel webview ──→ POST /events ──→ channel ──→ controller loop
//!                                                    │
//! panel webview ←── GET /state ←── watch ←───────────┘
//! ```
//!
//! The server never touches controller state; it only forwards events and
//! serves the latest snapshot published by the loop.

use crate::core::{AppSnapshot, PetEvent};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state
struct ServerState {
    events: Sender<PetEvent>,
    snapshot: watch::Receiver<AppSnapshot>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Event accepted response
#[derive(Serialize)]
pub struct AcceptedResponse {
    pub status: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /events
///
/// Forwards one tagged event to the controller loop.
async fn post_event(
    State(state): State<Arc<ServerState>>,
    Json(event): Json<PetEvent>,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    tracing::debug!("Bridge event {:?}", event);
    state.events.send(event).map_err(|_| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Pet controller is not running".to_string(),
                code: "CONTROLLER_STOPPED".to_string(),
            }),
        )
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".to_string(),
        }),
    ))
}

/// GET /state
async fn get_state(State(state): State<Arc<ServerState>>) -> Json<AppSnapshot> {
    Json(state.snapshot.borrow().clone())
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    events: Sender<PetEvent>,
    snapshot: watch::Receiver<AppSnapshot>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState { events, snapshot });

    let app = Router::new()
        .route("/health", get(health))
        .route("/events", post(post_event))
        .route("/state", get(get_state))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                    // Webview origins
                    HeaderValue::from_static("tauri://localhost"),
                    HeaderValue::from_static("http://tauri.localhost"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Event bridge listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
