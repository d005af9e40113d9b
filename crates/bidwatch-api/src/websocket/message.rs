//! WebSocket wire messages.

use bidwatch_protocols::{
    ActionAck, ActionKind, AuctionFields, AuctionState, ElementRole, FailureInfo, ProtocolError,
    SessionStatus,
};
use serde::{Deserialize, Serialize};

/// `{code, message}` pair used in error frames and HTTP error bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

/// Server → viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame on every connection.
    Connected { connection_id: String },

    /// Full current state; always sent right after `connected`.
    Snapshot {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        sequence: u64,
        state: Option<AuctionState>,
        status: SessionStatus,
    },

    /// Only the fields that changed since `sequence - 1`.
    StateUpdate {
        session_id: String,
        sequence: u64,
        changes: AuctionFields,
    },

    StatusChanged {
        session_id: String,
        status: SessionStatus,
        previous: SessionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        failure: Option<FailureInfo>,
    },

    Error { code: String, message: String },

    ActionResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ack: Option<ActionAck>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<WireError>,
    },

    Pong { timestamp: i64 },
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn action_ok(request_id: Option<String>, ack: ActionAck) -> Self {
        Self::ActionResult {
            request_id,
            ack: Some(ack),
            error: None,
        }
    }

    pub fn action_failed(request_id: Option<String>, error: WireError) -> Self {
        Self::ActionResult {
            request_id,
            ack: None,
            error: Some(error),
        }
    }
}

/// Action as requested over HTTP or WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Element role for `locate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ElementRole>,
}

impl ActionRequest {
    pub fn to_action(&self) -> Result<ActionKind, ProtocolError> {
        match self.kind.as_str() {
            "highlight_bid_button" => Ok(ActionKind::HighlightBidButton),
            "highlight_plus_button" => Ok(ActionKind::HighlightPlusButton),
            "click_plus" => Ok(ActionKind::ClickPlus),
            "prepare_bid" => {
                let amount = self.amount.ok_or_else(|| ProtocolError::InvalidField {
                    field: "amount",
                    message: "required for prepare_bid".to_string(),
                })?;
                Ok(ActionKind::PrepareBid { amount })
            }
            "locate" => {
                let role = self.role.ok_or_else(|| ProtocolError::InvalidField {
                    field: "role",
                    message: "required for locate".to_string(),
                })?;
                Ok(ActionKind::Locate { role })
            }
            other => Err(ProtocolError::InvalidField {
                field: "kind",
                message: format!("unknown action kind '{other}'"),
            }),
        }
    }
}

/// Viewer → server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping {
        #[serde(default)]
        timestamp: i64,
    },

    /// Highest sequence the viewer has applied.
    Ack { sequence: u64 },

    Action {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(flatten)]
        action: ActionRequest,
    },
}
