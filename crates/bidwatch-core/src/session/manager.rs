//! Control-plane handle to the session worker.

use std::sync::Arc;
use std::time::Duration;

use bidwatch_config::Config;
use bidwatch_protocols::{
    ActionAck, ActionKind, DiagnosticCapture, MonitorSession, PageSource, RelayError, RelayEvent,
    SessionStatus,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::worker::{Command, SessionWorker};

/// Cheap to clone; every clone talks to the same worker.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<MonitorSession>,
}

impl SessionManager {
    /// Spawn the session worker. Relay events are published into `events`.
    pub fn spawn(
        config: Arc<Config>,
        source: Arc<dyn PageSource>,
        events: mpsc::Sender<RelayEvent>,
    ) -> (Self, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(config.hub.command_queue.max(1));
        let (status_tx, status_rx) = watch::channel(MonitorSession::idle());
        let worker = SessionWorker::new(config, source, commands_rx, events, status_tx);
        let handle = tokio::spawn(worker.run());
        (
            Self {
                commands: commands_tx,
                status: status_rx,
            },
            handle,
        )
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RelayError::WorkerGone)?;
        rx.await.map_err(|_| RelayError::WorkerGone)
    }

    /// Start monitoring `url`.
    ///
    /// Returns once the session is `Navigating`; readiness is reported
    /// through status changes.
    pub async fn start(&self, url: impl Into<String>) -> Result<SessionHandle, RelayError> {
        let url = url.into();
        let session = self
            .request(|reply| Command::Start { url, reply })
            .await??;
        Ok(SessionHandle {
            session,
            status: self.status.clone(),
        })
    }

    /// Stop the current session. Stopping an idle or stopped session is a no-op.
    pub async fn stop(&self) -> Result<MonitorSession, RelayError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn dispatch(&self, action: ActionKind) -> Result<ActionAck, RelayError> {
        Ok(self
            .request(|reply| Command::Dispatch { action, reply })
            .await??)
    }

    /// Latest session summary.
    pub fn status(&self) -> MonitorSession {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<MonitorSession> {
        self.status.clone()
    }

    /// Screenshot captured when the current session failed, if any.
    pub fn diagnostic(&self) -> Option<DiagnosticCapture> {
        self.status.borrow().diagnostic.clone()
    }
}

/// A started session plus a view of its status.
pub struct SessionHandle {
    session: MonitorSession,
    status: watch::Receiver<MonitorSession>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.session.id
    }

    /// The session as it was when the start was accepted.
    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    /// Wait until this session reaches `status`.
    ///
    /// Returns `None` if the session was replaced, the worker went away or
    /// `timeout` elapsed first.
    pub async fn wait_for_status(
        &mut self,
        status: SessionStatus,
        timeout: Duration,
    ) -> Option<MonitorSession> {
        let id = self.session.id.clone();
        let wait = self
            .status
            .wait_for(|s| s.id != id || s.status == status);
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(current)) if current.id == id => Some(current.clone()),
            _ => None,
        }
    }
}
