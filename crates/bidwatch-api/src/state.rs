//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bidwatch_config::Config;
use bidwatch_core::SessionManager;
use bidwatch_protocols::{MonitorSession, PageSource};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::hub::BroadcastHub;

/// Application state shared across handlers.
pub struct AppState {
    pub sessions: SessionManager,
    pub hub: Arc<BroadcastHub>,
    start_time: Instant,
}

impl AppState {
    pub fn new(sessions: SessionManager, hub: Arc<BroadcastHub>) -> Self {
        Self {
            sessions,
            hub,
            start_time: Instant::now(),
        }
    }

    /// Spawn the session worker and the hub's event pump, and wire them
    /// together. The returned handle completes when the worker exits.
    pub fn launch(config: Arc<Config>, source: Arc<dyn PageSource>) -> (Arc<Self>, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::channel(config.hub.event_queue.max(1));
        let hub = Arc::new(BroadcastHub::new(config.hub.connection_queue));
        tokio::spawn(hub.clone().run(events_rx));

        let (sessions, worker) = SessionManager::spawn(config, source, events_tx);
        (Arc::new(Self::new(sessions, hub)), worker)
    }

    /// Current session summary with live viewer ids filled in.
    pub fn session_summary(&self) -> MonitorSession {
        let mut session = self.sessions.status();
        session.subscribers = self.hub.subscriber_ids();
        session
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
