//! WebSocket handler implementation.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

use super::message::{ClientMessage, ServerMessage};

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Pin the connection to one session id. Omitted follows the current session.
    pub session: Option<String>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, query.session, state))
}

async fn handle_socket(socket: WebSocket, session: Option<String>, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let subscription = match state.hub.subscribe(session) {
        Ok(sub) => sub,
        Err(e) => {
            warn!(error = %e, "Rejected viewer subscription");
            let frame = ServerMessage::error("PROTOCOL_ERROR", e.to_string());
            if let Ok(json) = serde_json::to_string(&frame) {
                let _ = sender.send(Message::Text(json.into())).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    let connection_id = subscription.id;
    let mut rx = subscription.rx;
    info!(connection_id = %connection_id, "WebSocket connected");

    // Ends when the hub drops this viewer or the socket stops accepting writes.
    let mut sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&msg) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            _ = &mut sender_task => {
                debug!(connection_id = %connection_id, "Outbound stream ended");
                break;
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_client_message(text.as_str(), &connection_id, &state).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    state.hub.unsubscribe(&connection_id);
    sender_task.abort();
    info!(connection_id = %connection_id, "WebSocket disconnected");
}

/// Handle one text frame from a viewer. Replies go through the hub so they
/// share the viewer's ordered outbound queue.
pub async fn handle_client_message(text: &str, connection_id: &str, state: &AppState) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(connection_id, error = %e, "Malformed viewer frame");
            state.hub.send_to(
                connection_id,
                ServerMessage::error("PROTOCOL_ERROR", format!("Malformed message: {e}")),
            );
            return;
        }
    };

    let reply = match message {
        ClientMessage::Ping { timestamp } => ServerMessage::Pong { timestamp },
        ClientMessage::Ack { sequence } => {
            state.hub.acknowledge(connection_id, sequence);
            return;
        }
        ClientMessage::Action { request_id, action } => {
            let result = match action.to_action() {
                Ok(kind) => state.sessions.dispatch(kind).await.map_err(ApiError::from),
                Err(e) => Err(ApiError::from(e)),
            };
            match result {
                Ok(ack) => ServerMessage::action_ok(request_id, ack),
                Err(e) => {
                    debug!(connection_id, code = e.code(), "Viewer action rejected");
                    ServerMessage::action_failed(request_id, e.to_wire())
                }
            }
        }
    };
    state.hub.send_to(connection_id, reply);
}
