//! Action errors.

use thiserror::Error;

use crate::action::ElementRole;
use crate::session::SessionStatus;

/// Failure of a single viewer action. Never changes session status.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    #[error("No element found for role {role}")]
    TargetNotFound { role: ElementRole },

    #[error("Page not ready for actions (session is {status})")]
    PageNotReady { status: SessionStatus },

    #[error("Action timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Script failed: {0}")]
    Script(String),
}

impl ActionError {
    /// Stable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TargetNotFound { .. } => "TARGET_NOT_FOUND",
            Self::PageNotReady { .. } => "PAGE_NOT_READY",
            Self::Timeout { .. } => "ACTION_TIMEOUT",
            Self::InvalidParams(_) => "INVALID_PARAMS",
            Self::Script(_) => "SCRIPT_ERROR",
        }
    }
}
