//! Top-level relay error type.

use thiserror::Error;

use super::{ActionError, BlockedError, NavigationError, PageError};
use crate::session::SessionStatus;

/// Policy rejection: a session is already active.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Session {active_id} is {status}; stop it before starting another")]
pub struct SessionConflict {
    pub active_id: String,
    pub status: SessionStatus,
}

/// Malformed control or viewer message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Invalid field {field}: {message}")]
    InvalidField { field: &'static str, message: String },
}

#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Blocked(#[from] BlockedError),

    #[error(transparent)]
    Conflict(#[from] SessionConflict),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Session worker is not running")]
    WorkerGone,
}
