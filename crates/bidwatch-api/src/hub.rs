//! Broadcast hub.
//!
//! Keeps the latest session record and auction snapshot, and fans relay
//! events out to every connected viewer. Each viewer owns a bounded outbound
//! queue; a viewer whose queue is full is dropped and must reconnect, at which
//! point it receives a fresh snapshot.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bidwatch_protocols::{AuctionState, MonitorSession, ProtocolError, RelayEvent, SessionStatus};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::websocket::ServerMessage;

/// A viewer's end of the hub.
#[derive(Debug)]
pub struct Subscription {
    pub id: String,
    pub rx: mpsc::Receiver<ServerMessage>,
}

#[derive(Debug)]
struct Connection {
    /// `None` follows whatever session is current.
    session_filter: Option<String>,
    tx: mpsc::Sender<ServerMessage>,
    last_ack: u64,
}

impl Connection {
    fn wants(&self, session_id: &str) -> bool {
        self.session_filter
            .as_deref()
            .is_none_or(|filter| filter == session_id)
    }
}

#[derive(Debug, Default)]
struct HubState {
    session: Option<MonitorSession>,
    snapshot: Option<AuctionState>,
    connections: HashMap<String, Connection>,
}

/// Connection registry plus snapshot cache.
#[derive(Debug)]
pub struct BroadcastHub {
    inner: Mutex<HubState>,
    queue_capacity: usize,
}

impl BroadcastHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HubState::default()),
            // Room for the `connected` + `snapshot` pair at minimum.
            queue_capacity: queue_capacity.max(2),
        }
    }

    /// Register a viewer.
    ///
    /// The `connected` frame and the current snapshot are queued before the
    /// connection becomes visible to `publish`, so the snapshot always comes
    /// first and every later diff carries a greater sequence.
    pub fn subscribe(&self, session_filter: Option<String>) -> Result<Subscription, ProtocolError> {
        let mut inner = self.inner.lock();

        if let Some(filter) = session_filter.as_deref() {
            let known = inner.session.as_ref().is_some_and(|s| s.id == filter);
            if !known {
                return Err(ProtocolError::InvalidField {
                    field: "session",
                    message: format!("unknown session '{filter}'"),
                });
            }
        }

        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let _ = tx.try_send(ServerMessage::Connected {
            connection_id: id.clone(),
        });
        let _ = tx.try_send(snapshot_message(&inner));

        inner.connections.insert(
            id.clone(),
            Connection {
                session_filter,
                tx,
                last_ack: 0,
            },
        );
        info!(connection_id = %id, viewers = inner.connections.len(), "Viewer subscribed");

        Ok(Subscription { id, rx })
    }

    pub fn unsubscribe(&self, connection_id: &str) {
        let mut inner = self.inner.lock();
        if inner.connections.remove(connection_id).is_some() {
            info!(connection_id, viewers = inner.connections.len(), "Viewer unsubscribed");
        }
    }

    /// Record the highest sequence a viewer has applied. Never moves backwards.
    pub fn acknowledge(&self, connection_id: &str, sequence: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.connections.get_mut(connection_id) {
            Some(conn) => {
                conn.last_ack = conn.last_ack.max(sequence);
                true
            }
            None => false,
        }
    }

    pub fn last_ack(&self, connection_id: &str) -> Option<u64> {
        self.inner.lock().connections.get(connection_id).map(|c| c.last_ack)
    }

    /// Queue a reply for one viewer. Overflow drops the viewer like a fan-out.
    pub fn send_to(&self, connection_id: &str, message: ServerMessage) -> bool {
        let mut inner = self.inner.lock();
        let Some(conn) = inner.connections.get(connection_id) else {
            return false;
        };
        match conn.tx.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                drop_connection(&mut inner, connection_id, &e);
                false
            }
        }
    }

    /// Apply one relay event to the cache and fan it out.
    pub fn publish(&self, event: RelayEvent) {
        let mut inner = self.inner.lock();
        let session_id = event.session_id().to_string();

        let message = match event {
            RelayEvent::StateUpdated { state, diff, .. } => {
                debug!(session_id = %session_id, sequence = diff.sequence, "Fanning out state update");
                inner.snapshot = Some(state);
                ServerMessage::StateUpdate {
                    session_id: session_id.clone(),
                    sequence: diff.sequence,
                    changes: diff.changes,
                }
            }
            RelayEvent::StatusChanged {
                session,
                previous,
                reason,
            } => {
                let replaced = inner.session.as_ref().is_none_or(|s| s.id != session.id);
                if replaced {
                    inner.snapshot = None;
                }
                let message = ServerMessage::StatusChanged {
                    session_id: session_id.clone(),
                    status: session.status,
                    previous,
                    reason,
                    failure: session.failure.clone(),
                };
                inner.session = Some(session);
                message
            }
            RelayEvent::Notice { code, message, .. } => ServerMessage::Error { code, message },
        };

        let mut dropped = Vec::new();
        for (id, conn) in &inner.connections {
            if !conn.wants(&session_id) {
                continue;
            }
            if let Err(e) = conn.tx.try_send(message.clone()) {
                dropped.push((id.clone(), e));
            }
        }
        for (id, e) in dropped {
            drop_connection(&mut inner, &id, &e);
        }
    }

    /// Latest published auction state, if any.
    pub fn snapshot(&self) -> Option<AuctionState> {
        self.inner.lock().snapshot.clone()
    }

    /// Latest session record as seen through relay events, with the viewers
    /// currently following it.
    pub fn session(&self) -> Option<MonitorSession> {
        let inner = self.inner.lock();
        let mut session = inner.session.clone()?;
        session.subscribers = inner
            .connections
            .iter()
            .filter(|(_, conn)| conn.wants(&session.id))
            .map(|(id, _)| id.clone())
            .collect();
        Some(session)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    pub fn subscriber_ids(&self) -> BTreeSet<String> {
        self.inner.lock().connections.keys().cloned().collect()
    }

    /// Drain the worker's event queue until it closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<RelayEvent>) {
        while let Some(event) = events.recv().await {
            self.publish(event);
        }
        debug!("Relay event queue closed");
    }
}

fn snapshot_message(inner: &HubState) -> ServerMessage {
    ServerMessage::Snapshot {
        session_id: inner.session.as_ref().map(|s| s.id.clone()),
        sequence: inner.snapshot.as_ref().map_or(0, |s| s.sequence),
        state: inner.snapshot.clone(),
        status: inner
            .session
            .as_ref()
            .map_or(SessionStatus::Idle, |s| s.status),
    }
}

fn drop_connection<T>(inner: &mut HubState, connection_id: &str, error: &TrySendError<T>) {
    if inner.connections.remove(connection_id).is_none() {
        return;
    }
    match error {
        TrySendError::Full(_) => {
            warn!(connection_id, "Viewer queue full, disconnecting slow viewer")
        }
        TrySendError::Closed(_) => debug!(connection_id, "Viewer went away"),
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
