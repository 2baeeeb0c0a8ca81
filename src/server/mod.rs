//! HTTP server: on-demand outlooks over a small JSON API.
//!
//! Routes:
//! - `GET  /health`
//! - `GET  /api/sessions`
//! - `POST /api/outlook/:session`
//! - `GET  /api/latest`
//!
//! CORS enabled for local tooling.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::runner::Runner;
use routes::{AppState, ServerState};

/// Bind and serve until the process is stopped.
pub async fn serve(runner: Runner, port: u16) -> Result<()> {
    let app = build_router(Arc::new(ServerState::new(runner)));
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind port {port}"))?;
    info!(port, "Outlook server listening on http://localhost:{port}");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/sessions", get(routes::list_sessions))
        .route("/api/outlook/:session", post(routes::run_outlook))
        .route("/api/latest", get(routes::latest))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
