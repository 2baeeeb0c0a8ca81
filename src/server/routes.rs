//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ServerState>`.
//! `/api/latest` also reads reports persisted by `outlook run`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::report::OutlookReport;
use crate::runner::Runner;
use crate::storage;
use crate::types::{OutlookError, Session};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub runner: Runner,
    pub latest: RwLock<Option<OutlookReport>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl ServerState {
    pub fn new(runner: Runner) -> Self {
        Self {
            runner,
            latest: RwLock::new(None),
            started_at: chrono::Utc::now(),
        }
    }
}

pub type AppState = Arc<ServerState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub config_version: String,
    pub provider: String,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub token: String,
    pub label: Option<&'static str>,
    pub weekend: bool,
    /// A `[sessions.<token>]` override exists.
    pub has_override: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionsResponse {
    pub has_default: bool,
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    error: String,
}

/// An `anyhow` error mapped onto an HTTP status.
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<OutlookError>() {
            Some(OutlookError::UnknownSession { .. }) => StatusCode::NOT_FOUND,
            Some(OutlookError::Data { .. }) => StatusCode::BAD_GATEWAY,
            Some(OutlookError::ConfigurationDefect(_)) | Some(OutlookError::Storage(_)) | None => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        warn!(status = status.as_u16(), error = %self.0, "Request failed");
        let body = ErrorBody {
            error: format!("{:#}", self.0),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        config_version: state.runner.config().version.clone(),
        provider: state.runner.provider_name(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /api/sessions
///
/// The seven known sessions followed by any custom override tokens.
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    let scenarios = state.runner.scenarios();

    let mut sessions: Vec<SessionInfo> = Session::ALL
        .iter()
        .map(|s| SessionInfo {
            token: s.label().to_string(),
            label: Some(s.label()),
            weekend: s.is_weekend(),
            has_override: scenarios.session_slice(s.label()).is_some(),
        })
        .collect();

    sessions.extend(
        scenarios
            .session_tokens()
            .filter(|t| t.parse::<Session>().is_err())
            .map(|t| SessionInfo {
                token: t.to_string(),
                label: None,
                weekend: false,
                has_override: true,
            }),
    );

    Json(SessionsResponse {
        has_default: scenarios.default_slice().is_some(),
        sessions,
    })
}

/// POST /api/outlook/:session
///
/// Scores the session on demand. Nothing is written to disk; the report
/// becomes the one served by `/api/latest`.
pub async fn run_outlook(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<Json<OutlookReport>, ApiError> {
    let (report, _snapshot) = state.runner.evaluate(&session).await?;
    info!(run_id = %report.run_id(), "On-demand outlook served");
    *state.latest.write().await = Some(report.clone());
    Ok(Json(report))
}

/// GET /api/latest
///
/// The last on-demand outlook of this server, else the newest report
/// persisted under the runner's output directory.
pub async fn latest(State(state): State<AppState>) -> Result<Response, ApiError> {
    if let Some(report) = state.latest.read().await.as_ref() {
        return Ok(Json(report.clone()).into_response());
    }

    let root = state.runner.output_dir().to_path_buf();
    let persisted = tokio::task::spawn_blocking(move || storage::latest_document(root))
        .await
        .map_err(anyhow::Error::from)??;

    Ok(match persisted {
        Some(doc) => Json(doc).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "no outlook has been produced yet".to_string(),
            }),
        )
            .into_response(),
    })
}
