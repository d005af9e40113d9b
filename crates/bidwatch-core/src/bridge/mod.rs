//! Observer bridge.
//!
//! Installs the in-page DOM watcher and network hook, then forwards every raw
//! page event that passes the traffic filters into one bounded, ordered queue.
//! The bridge never interprets payloads; that is the reconciler's job.

pub mod scripts;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bidwatch_config::{FieldSelectors, ObserverConfig};
use bidwatch_protocols::{ObservedEvent, PageAdapter, PageError, PageEvent};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;

/// What the bridge delivers to the session worker.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeSignal {
    Event(ObservedEvent),
    /// The main frame navigated; the watcher is gone until re-attached.
    Detached { url: String },
    /// The page went away for good.
    Closed,
}

pub struct ObserverBridge {
    config: ObserverConfig,
    fields: FieldSelectors,
    attached: Arc<AtomicBool>,
    forwarder: Option<JoinHandle<()>>,
}

impl ObserverBridge {
    pub fn new(config: ObserverConfig, fields: FieldSelectors) -> Self {
        Self {
            config,
            fields,
            attached: Arc::new(AtomicBool::new(false)),
            forwarder: None,
        }
    }

    /// Install the watchers and start forwarding.
    ///
    /// Returns the receiving end of the event queue. Calling `attach` again
    /// replaces the previous forwarder.
    pub async fn attach(
        &mut self,
        page: &Arc<dyn PageAdapter>,
    ) -> Result<mpsc::Receiver<BridgeSignal>, PageError> {
        self.detach();

        // Subscribe first so the watcher's initial snapshot is not missed.
        let events = page.subscribe();
        page.expose_binding(&self.config.binding_name).await?;
        page.add_init_script(&scripts::network_hook(&self.config, &self.fields))
            .await?;
        self.install(page.as_ref()).await?;

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let forwarder = Forwarder {
            binding: self.config.binding_name.clone(),
            filters: self.config.network_filters.clone(),
            attached: self.attached.clone(),
        };
        self.forwarder = Some(tokio::spawn(forwarder.run(events, tx)));
        info!(binding = %self.config.binding_name, "Observer bridge attached");
        Ok(rx)
    }

    /// Re-install the watchers after a navigation. The forwarder keeps running.
    pub async fn reattach(&self, page: &dyn PageAdapter) -> Result<(), PageError> {
        self.install(page).await?;
        info!("Observer bridge re-attached");
        Ok(())
    }

    async fn install(&self, page: &dyn PageAdapter) -> Result<(), PageError> {
        // Mark attached before the install call: the watcher emits its first
        // snapshot while the evaluate is still in flight.
        self.attached.store(true, Ordering::SeqCst);
        let result = async {
            page.evaluate(&scripts::network_hook(&self.config, &self.fields))
                .await?;
            page.evaluate(&scripts::observer(&self.config, &self.fields))
                .await
        }
        .await;
        if let Err(e) = result {
            self.attached.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    /// One-shot field snapshot, shaped like a mutation batch.
    pub async fn scrape(&self, page: &dyn PageAdapter) -> Result<ObservedEvent, PageError> {
        let payload = page
            .evaluate(&scripts::scrape(&self.config, &self.fields))
            .await?;
        Ok(ObservedEvent::mutation(payload))
    }

    pub fn is_attached(&self) -> bool {
        self.forwarder.is_some() && self.attached.load(Ordering::SeqCst)
    }

    /// Stop forwarding. In-page scripts stay inert once nobody listens.
    pub fn detach(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
            debug!("Observer bridge detached");
        }
        self.attached.store(false, Ordering::SeqCst);
    }
}

impl Drop for ObserverBridge {
    fn drop(&mut self) {
        self.detach();
    }
}

struct Forwarder {
    binding: String,
    filters: Vec<String>,
    attached: Arc<AtomicBool>,
}

impl Forwarder {
    async fn run(self, mut events: broadcast::Receiver<PageEvent>, tx: mpsc::Sender<BridgeSignal>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Observer bridge fell behind page events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    let _ = tx.send(BridgeSignal::Closed).await;
                    return;
                }
            };

            let signal = match event {
                PageEvent::Navigated { url } => {
                    self.attached.store(false, Ordering::SeqCst);
                    Some(BridgeSignal::Detached { url })
                }
                PageEvent::Closed => {
                    self.attached.store(false, Ordering::SeqCst);
                    let _ = tx.send(BridgeSignal::Closed).await;
                    return;
                }
                _ if !self.attached.load(Ordering::SeqCst) => None,
                PageEvent::BindingCalled { name, payload } if name == self.binding => {
                    self.classify_binding(&payload)
                }
                PageEvent::SocketFrame { url, payload } if self.matches(&url) => {
                    Some(BridgeSignal::Event(ObservedEvent::network(
                        json!({"url": url, "body": payload}),
                    )))
                }
                _ => None,
            };

            if let Some(signal) = signal {
                // Backpressure, not loss: wait for the worker to drain.
                if tx.send(signal).await.is_err() {
                    return;
                }
            }
        }
    }

    fn matches(&self, url: &str) -> bool {
        self.filters.iter().any(|f| url.contains(f.as_str()))
    }

    fn classify_binding(&self, payload: &str) -> Option<BridgeSignal> {
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed binding payload");
                return None;
            }
        };

        match value.get("kind").and_then(Value::as_str) {
            Some("mutation") => Some(BridgeSignal::Event(ObservedEvent::mutation(value))),
            Some("network") => {
                let url = value.get("url").and_then(Value::as_str).unwrap_or_default();
                if !self.matches(url) {
                    return None;
                }
                let body = value.get("body").cloned().unwrap_or(Value::Null);
                Some(BridgeSignal::Event(ObservedEvent::network(
                    json!({"url": url, "body": body}),
                )))
            }
            other => {
                debug!(kind = ?other, "Ignoring binding payload of unknown kind");
                None
            }
        }
    }
}
