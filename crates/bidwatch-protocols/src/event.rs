//! Events flowing through the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auction::{AuctionState, StateDiff};
use crate::session::{MonitorSession, SessionStatus};

/// Which observation channel produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Mutation,
    Network,
}

/// Raw, untrusted input captured from the page.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEvent {
    pub source: EventSource,
    pub payload: Value,
    pub captured_at: DateTime<Utc>,
}

impl ObservedEvent {
    pub fn new(source: EventSource, payload: Value) -> Self {
        Self {
            source,
            payload,
            captured_at: Utc::now(),
        }
    }

    pub fn mutation(payload: Value) -> Self {
        Self::new(EventSource::Mutation, payload)
    }

    pub fn network(payload: Value) -> Self {
        Self::new(EventSource::Network, payload)
    }
}

/// Published by the session worker, consumed by the broadcast hub.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A new canonical state was published.
    StateUpdated {
        session_id: String,
        state: AuctionState,
        diff: StateDiff,
    },
    /// The session moved to a new lifecycle status.
    StatusChanged {
        session: MonitorSession,
        previous: SessionStatus,
        reason: Option<String>,
    },
    /// Viewer-facing warning that does not change status.
    Notice {
        session_id: String,
        code: String,
        message: String,
    },
}

impl RelayEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::StateUpdated { session_id, .. } => session_id,
            Self::StatusChanged { session, .. } => &session.id,
            Self::Notice { session_id, .. } => session_id,
        }
    }
}
