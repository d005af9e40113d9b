//! Monitoring session lifecycle types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

/// Lifecycle status of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Navigating,
    Ready,
    Monitoring,
    Degraded,
    Failed,
    Stopped,
}

impl SessionStatus {
    /// Terminal statuses allow a new session to be started.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed | Self::Stopped)
    }

    /// Statuses in which the page is usable for scraping and actions.
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Ready | Self::Monitoring | Self::Degraded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Navigating => "navigating",
            Self::Ready => "ready",
            Self::Monitoring => "monitoring",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Blocked,
    Navigation,
    PageClosed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Navigation => "navigation",
            Self::PageClosed => "page_closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub message: String,
}

/// Best-effort screenshot taken when a session fails.
///
/// The image itself is kept in memory and served separately; only the
/// reference is part of the session summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticCapture {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    pub format: String,
    /// Base64-encoded image bytes.
    #[serde(skip)]
    pub data: String,
}

/// One monitored auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSession {
    pub id: String,
    pub target_url: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub subscribers: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
    #[serde(default)]
    pub navigation_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<DiagnosticCapture>,
}

impl MonitorSession {
    /// Create a session in `Idle` for the given target.
    pub fn new(target_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target_url: target_url.into(),
            status: SessionStatus::Idle,
            created_at: now,
            last_activity: now,
            subscribers: BTreeSet::new(),
            failure: None,
            navigation_attempts: 0,
            diagnostic: None,
        }
    }

    /// Placeholder reported before any session has been started.
    pub fn idle() -> Self {
        Self::new("")
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
