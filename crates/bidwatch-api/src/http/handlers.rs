//! HTTP request handlers for the control plane.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bidwatch_protocols::{ActionAck, AuctionState, MonitorSession, ProtocolError, SessionStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::websocket::ActionRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub session: MonitorSession,
    /// Latest published state of `session`, if any.
    pub snapshot: Option<AuctionState>,
    pub viewers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub session_status: SessionStatus,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ProtocolError::Malformed(e.body_text()).into())
}

/// `POST /api/session/start`
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<MonitorSession>, ApiError> {
    let request = body(payload)?;
    let handle = state.sessions.start(request.url).await?;
    info!(session_id = %handle.id(), "Session started via API");
    Ok(Json(handle.session().clone()))
}

/// `POST /api/session/stop`
pub async fn stop_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MonitorSession>, ApiError> {
    let session = state.sessions.stop().await?;
    Ok(Json(session))
}

/// `GET /api/status`
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let session = state.session_summary();
    let snapshot = match state.hub.session() {
        Some(seen) if seen.id == session.id => state.hub.snapshot(),
        _ => None,
    };
    Json(StatusResponse {
        session,
        snapshot,
        viewers: state.hub.connection_count(),
    })
}

/// `POST /api/actions`
pub async fn dispatch_action(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionAck>, ApiError> {
    let action = body(payload)?.to_action()?;
    let ack = state.sessions.dispatch(action).await?;
    Ok(Json(ack))
}

/// `GET /api/session/diagnostic`
pub async fn get_diagnostic(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let capture = state
        .sessions
        .diagnostic()
        .ok_or_else(|| ApiError::NotFound("no diagnostic capture".to_string()))?;
    let png = STANDARD
        .decode(capture.data.as_bytes())
        .map_err(|e| ApiError::Internal(format!("corrupt diagnostic capture: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime().as_secs(),
        session_status: state.sessions.status().status,
    })
}
