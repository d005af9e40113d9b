//! API error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bidwatch_protocols::{ProtocolError, RelayError};
use thiserror::Error;

use crate::websocket::WireError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable code shared by HTTP bodies and WebSocket error frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Relay(RelayError::Conflict(_)) => "SESSION_CONFLICT",
            Self::Relay(RelayError::Protocol(_)) | Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Relay(RelayError::Action(e)) => e.code(),
            Self::Relay(RelayError::Navigation(_)) => "NAVIGATION_FAILED",
            Self::Relay(RelayError::Blocked(_)) => "BLOCKED",
            Self::Relay(RelayError::Page(_)) => "PAGE_ERROR",
            Self::Relay(RelayError::WorkerGone) => "WORKER_UNAVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Relay(RelayError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Relay(RelayError::Protocol(_)) | Self::Protocol(_) => StatusCode::BAD_REQUEST,
            Self::Relay(RelayError::Action(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Relay(RelayError::Navigation(_))
            | Self::Relay(RelayError::Blocked(_))
            | Self::Relay(RelayError::Page(_)) => StatusCode::BAD_GATEWAY,
            Self::Relay(RelayError::WorkerGone) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_wire(&self) -> WireError {
        WireError {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_wire() });
        (self.status_code(), Json(body)).into_response()
    }
}
