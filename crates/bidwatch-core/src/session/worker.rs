//! The single owner of the browser page.
//!
//! Every page-touching operation runs on this task, so navigation, scraping
//! and actions are serialized without locks around the page.

use std::sync::Arc;
use std::time::Duration;

use bidwatch_config::Config;
use bidwatch_protocols::{
    ActionAck, ActionError, ActionKind, DiagnosticCapture, FailureInfo, FailureKind,
    MonitorSession, PageAdapter, PageError, PageSource, RelayError, RelayEvent, SessionConflict,
    SessionStatus,
};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::navigation::{
    NavigationFailure, ReadyPage, dismiss_interstitials, lot_hint, navigate_until_ready,
    resolve_target_url,
};
use crate::actions::ActionRelay;
use crate::bridge::{BridgeSignal, ObserverBridge};
use crate::reconciler::StateReconciler;

const DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) enum Command {
    Start {
        url: String,
        reply: oneshot::Sender<Result<MonitorSession, RelayError>>,
    },
    Stop {
        reply: oneshot::Sender<MonitorSession>,
    },
    Dispatch {
        action: ActionKind,
        reply: oneshot::Sender<Result<ActionAck, ActionError>>,
    },
}

/// Everything that lives exactly as long as one page.
struct ActiveSession {
    page: Arc<dyn PageAdapter>,
    bridge: ObserverBridge,
    signals: Option<mpsc::Receiver<BridgeSignal>>,
    reconciler: StateReconciler,
    actions: ActionRelay,
    next_scrape: Instant,
}

impl ActiveSession {
    fn new(config: &Config, page: Arc<dyn PageAdapter>, lot: Option<String>) -> Self {
        Self {
            page,
            bridge: ObserverBridge::new(config.observer.clone(), config.selectors.fields.clone()),
            signals: None,
            reconciler: StateReconciler::with_default_strategies(&config.reconciler)
                .with_lot_hint(lot),
            actions: ActionRelay::new(&config.actions, config.selectors.elements.clone()),
            next_scrape: Instant::now(),
        }
    }
}

enum Interrupt {
    Done(Result<ReadyPage, NavigationFailure>),
    Stop(oneshot::Sender<MonitorSession>),
    Shutdown,
}

pub(crate) struct SessionWorker {
    config: Arc<Config>,
    source: Arc<dyn PageSource>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<RelayEvent>,
    status: watch::Sender<MonitorSession>,
    session: MonitorSession,
    active: Option<ActiveSession>,
}

impl SessionWorker {
    pub(crate) fn new(
        config: Arc<Config>,
        source: Arc<dyn PageSource>,
        commands: mpsc::Receiver<Command>,
        events: mpsc::Sender<RelayEvent>,
        status: watch::Sender<MonitorSession>,
    ) -> Self {
        Self {
            config,
            source,
            commands,
            events,
            status,
            session: MonitorSession::idle(),
            active: None,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut tick = tokio::time::interval(self.config.reconciler.tick());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Session worker started");

        loop {
            let cycle_deadline = self
                .active
                .as_ref()
                .and_then(|a| a.reconciler.cycle_deadline());
            let revert_deadline = self.active.as_ref().and_then(|a| a.actions.next_expiry());

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                signal = next_signal(&mut self.active) => self.handle_signal(signal).await,
                _ = sleep_until_opt(cycle_deadline) => self.flush().await,
                _ = sleep_until_opt(revert_deadline) => self.revert_expired().await,
                _ = tick.tick() => self.on_tick().await,
            }
        }

        self.release().await;
        info!("Session worker stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { url, reply } => self.start(url, reply).await,
            Command::Stop { reply } => self.stop(reply).await,
            Command::Dispatch { action, reply } => {
                let result = self.dispatch(action).await;
                let _ = reply.send(result);
            }
        }
    }

    fn conflict(&self) -> RelayError {
        SessionConflict {
            active_id: self.session.id.clone(),
            status: self.session.status,
        }
        .into()
    }

    async fn start(
        &mut self,
        url: String,
        reply: oneshot::Sender<Result<MonitorSession, RelayError>>,
    ) {
        if !self.session.status.is_terminal() {
            let _ = reply.send(Err(self.conflict()));
            return;
        }
        let target = match resolve_target_url(&url, self.config.session.site_base_url.as_deref()) {
            Ok(target) => target,
            Err(e) => {
                let _ = reply.send(Err(e.into()));
                return;
            }
        };

        // A failed session keeps its page for inspection until replaced.
        self.release().await;
        self.session = MonitorSession::new(target.clone());
        info!(session_id = %self.session.id, url = %target, "Starting session");
        self.transition(SessionStatus::Navigating, None).await;
        let _ = reply.send(Ok(self.session.clone()));

        self.navigate(target).await;
    }

    async fn navigate(&mut self, url: String) {
        let page = match self.source.open().await {
            Ok(page) => page,
            Err(e) => {
                self.fail(FailureKind::Navigation, format!("Could not open a page: {e}"))
                    .await;
                return;
            }
        };
        let config = self.config.clone();
        self.active = Some(ActiveSession::new(&config, page.clone(), lot_hint(&url)));

        let interrupt = {
            let navigation = navigate_until_ready(page.as_ref(), &config.session, &url);
            tokio::pin!(navigation);
            loop {
                tokio::select! {
                    result = &mut navigation => break Interrupt::Done(result),
                    command = self.commands.recv() => match command {
                        Some(Command::Stop { reply }) => break Interrupt::Stop(reply),
                        Some(Command::Start { reply, .. }) => {
                            let _ = reply.send(Err(self.conflict()));
                        }
                        Some(Command::Dispatch { reply, .. }) => {
                            let _ = reply.send(Err(ActionError::PageNotReady {
                                status: self.session.status,
                            }));
                        }
                        None => break Interrupt::Shutdown,
                    },
                }
            }
        };

        match interrupt {
            Interrupt::Done(Ok(ready)) => {
                self.session.navigation_attempts = ready.attempts;
                self.on_ready(ready).await;
            }
            Interrupt::Done(Err(failure)) => self.on_navigation_failure(failure).await,
            Interrupt::Stop(reply) => {
                info!(session_id = %self.session.id, "Navigation cancelled by stop");
                self.stop(reply).await;
            }
            Interrupt::Shutdown => {}
        }
    }

    async fn on_ready(&mut self, ready: ReadyPage) {
        self.transition(
            SessionStatus::Ready,
            Some(format!("Ready selector {} matched", ready.selector)),
        )
        .await;

        let Some(active) = self.active.as_mut() else {
            return;
        };
        dismiss_interstitials(active.page.as_ref(), &self.config.session.dismiss_selectors).await;
        match active.bridge.attach(&active.page).await {
            Ok(signals) => active.signals = Some(signals),
            Err(PageError::Closed) => {
                self.page_closed().await;
                return;
            }
            // Retried from the tick.
            Err(e) => warn!(error = %e, "Observer attach failed"),
        }
        active.reconciler.reset_staleness();
        active.next_scrape = Instant::now() + self.config.reconciler.health_check_interval();

        self.transition(SessionStatus::Monitoring, None).await;

        // Publish the first snapshot without waiting for a mutation.
        self.scrape().await;
        self.flush().await;
    }

    async fn on_navigation_failure(&mut self, failure: NavigationFailure) {
        match failure {
            NavigationFailure::Blocked { attempts, error } => {
                self.session.navigation_attempts = attempts;
                self.capture_diagnostic().await;
                self.fail(FailureKind::Blocked, error.to_string()).await;
            }
            NavigationFailure::Exhausted(error) => {
                self.session.navigation_attempts = self.config.session.max_attempts.max(1);
                self.capture_diagnostic().await;
                self.fail(FailureKind::Navigation, error.to_string()).await;
            }
            NavigationFailure::PageClosed { attempts } => {
                self.session.navigation_attempts = attempts;
                self.page_closed().await;
            }
        }
    }

    async fn capture_diagnostic(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        match tokio::time::timeout(DIAGNOSTIC_TIMEOUT, active.page.capture_screenshot()).await {
            Ok(Ok(data)) => {
                let capture = DiagnosticCapture {
                    id: uuid::Uuid::new_v4().to_string(),
                    captured_at: Utc::now(),
                    format: "png".to_string(),
                    data,
                };
                info!(session_id = %self.session.id, capture_id = %capture.id, "Diagnostic captured");
                self.session.diagnostic = Some(capture);
            }
            Ok(Err(e)) => warn!(error = %e, "Diagnostic capture failed"),
            Err(_) => warn!("Diagnostic capture timed out"),
        }
    }

    async fn handle_signal(&mut self, signal: Option<BridgeSignal>) {
        match signal {
            Some(BridgeSignal::Event(event)) => {
                if let Some(active) = self.active.as_mut() {
                    active.reconciler.observe(event);
                }
            }
            Some(BridgeSignal::Detached { url }) => {
                info!(url = %url, "Page navigated, re-attaching observer");
                self.ensure_attached().await;
            }
            Some(BridgeSignal::Closed) => self.page_closed().await,
            None => {
                if let Some(active) = self.active.as_mut() {
                    active.signals = None;
                }
                debug!("Observer queue closed");
            }
        }
    }

    async fn ensure_attached(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let result = if active.signals.is_some() {
            active.bridge.reattach(active.page.as_ref()).await
        } else {
            match active.bridge.attach(&active.page).await {
                Ok(signals) => {
                    active.signals = Some(signals);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };
        match result {
            Ok(()) => {}
            Err(PageError::Closed) => self.page_closed().await,
            Err(e) => warn!(error = %e, "Observer re-attach failed, will retry"),
        }
    }

    async fn flush(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let previous = active.reconciler.snapshot().cloned();
        let published = active.reconciler.flush_cycle();
        let fresh = !active.reconciler.is_stale(Instant::now());

        if let Some(state) = published {
            let diff = state.diff_from(previous.as_ref());
            debug!(sequence = state.sequence, bid = state.current_bid, "State published");
            self.session.touch();
            self.publish(RelayEvent::StateUpdated {
                session_id: self.session.id.clone(),
                state,
                diff,
            })
            .await;
        }

        if fresh && self.session.status == SessionStatus::Degraded {
            self.transition(
                SessionStatus::Monitoring,
                Some("Fresh data received".to_string()),
            )
            .await;
        }
    }

    async fn revert_expired(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active
                .actions
                .revert_expired(active.page.as_ref(), Instant::now())
                .await;
        }
    }

    async fn on_tick(&mut self) {
        let status = self.session.status;
        if !matches!(status, SessionStatus::Monitoring | SessionStatus::Degraded) {
            return;
        }

        if self.active.as_ref().is_some_and(|a| !a.bridge.is_attached()) {
            self.ensure_attached().await;
        }

        let now = Instant::now();
        let stale = self
            .active
            .as_ref()
            .is_some_and(|a| a.reconciler.is_stale(now));
        if status == SessionStatus::Monitoring && stale {
            let window = self.config.reconciler.staleness_window_secs;
            let message = format!("No complete auction update for {window}s; polling the page");
            self.transition(SessionStatus::Degraded, Some(message.clone()))
                .await;
            self.publish(RelayEvent::Notice {
                session_id: self.session.id.clone(),
                code: "STALE_DATA".to_string(),
                message,
            })
            .await;
            if let Some(active) = self.active.as_mut() {
                active.next_scrape = now;
            }
        }

        let interval = match self.session.status {
            SessionStatus::Degraded => self.config.reconciler.fallback_poll_interval(),
            _ => self.config.reconciler.health_check_interval(),
        };
        let due = match self.active.as_mut() {
            Some(active) if now >= active.next_scrape => {
                active.next_scrape = now + interval;
                true
            }
            _ => false,
        };
        if due {
            self.scrape().await;
        }
    }

    async fn scrape(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.bridge.scrape(active.page.as_ref()).await {
            Ok(event) => active.reconciler.observe(event),
            Err(PageError::Closed) => self.page_closed().await,
            Err(e) => debug!(error = %e, "Scrape failed"),
        }
    }

    async fn dispatch(&mut self, action: ActionKind) -> Result<ActionAck, ActionError> {
        let status = self.session.status;
        let active = match self.active.as_mut() {
            Some(active) if status.is_attached() => active,
            _ => return Err(ActionError::PageNotReady { status }),
        };
        let current_bid = active.reconciler.snapshot().map(|s| s.current_bid);
        let result = active
            .actions
            .dispatch(active.page.as_ref(), &action, current_bid)
            .await;
        match &result {
            Ok(ack) => info!(action = %ack.kind, coalesced = ack.coalesced, "Action applied"),
            Err(e) => warn!(action = action.name(), error = %e, "Action failed"),
        }
        result
    }

    async fn stop(&mut self, reply: oneshot::Sender<MonitorSession>) {
        if matches!(
            self.session.status,
            SessionStatus::Idle | SessionStatus::Stopped
        ) {
            let _ = reply.send(self.session.clone());
            return;
        }
        self.release().await;
        self.transition(SessionStatus::Stopped, Some("Stopped on request".to_string()))
            .await;
        let _ = reply.send(self.session.clone());
    }

    /// Revert highlights, stop observing and close the page.
    async fn release(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.actions.revert_all(active.page.as_ref()).await;
        active.bridge.detach();
        if let Err(e) = active.page.close().await {
            debug!(error = %e, "Page close failed");
        }
        info!(session_id = %self.session.id, "Page released");
    }

    async fn page_closed(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.bridge.detach();
        }
        if self.session.status.is_terminal() {
            return;
        }
        self.fail(FailureKind::PageClosed, "The monitored page was closed".to_string())
            .await;
    }

    async fn fail(&mut self, kind: FailureKind, message: String) {
        warn!(session_id = %self.session.id, kind = kind.as_str(), message = %message, "Session failed");
        self.session.failure = Some(FailureInfo {
            kind,
            message: message.clone(),
        });
        self.transition(SessionStatus::Failed, Some(message)).await;
    }

    async fn transition(&mut self, status: SessionStatus, reason: Option<String>) {
        let previous = self.session.status;
        if previous == status {
            return;
        }
        self.session.status = status;
        self.session.touch();
        info!(
            session_id = %self.session.id,
            from = %previous,
            to = %status,
            reason = reason.as_deref().unwrap_or(""),
            "Session status changed"
        );
        self.status.send_replace(self.session.clone());
        self.publish(RelayEvent::StatusChanged {
            session: self.session.clone(),
            previous,
            reason,
        })
        .await;
    }

    async fn publish(&self, event: RelayEvent) {
        if self.events.send(event).await.is_err() {
            debug!("No event consumer, dropping relay event");
        }
    }
}

async fn next_signal(active: &mut Option<ActiveSession>) -> Option<BridgeSignal> {
    match active.as_mut().and_then(|a| a.signals.as_mut()) {
        Some(signals) => signals.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
