//! A single attached tab.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bidwatch_protocols::{PageAdapter, PageError, PageEvent};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::Connection;
use crate::error::CdpError;
use crate::protocol::{CdpResponse, EventTranslator};

const EVENT_CAPACITY: usize = 256;
const LOAD_POLL: Duration = Duration::from_millis(100);

/// A tab attached through a flattened CDP session.
pub struct CdpPage {
    target_id: String,
    session_id: String,
    connection: Arc<Connection>,
    events: broadcast::Sender<PageEvent>,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl CdpPage {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        connection: Arc<Connection>,
        raw_events: mpsc::UnboundedReceiver<CdpResponse>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));
        let pump = tokio::spawn(pump_events(raw_events, events.clone(), closed.clone()));
        Self {
            target_id,
            session_id,
            connection,
            events,
            closed,
            pump,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || !self.connection.is_alive()
    }

    /// Send a command on this page's session.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        if self.is_closed() {
            return Err(CdpError::SessionClosed);
        }
        self.connection
            .call(method, params, Some(&self.session_id))
            .await
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    async fn evaluate_value(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    async fn wait_for_load(&self) -> Result<(), CdpError> {
        let deadline = tokio::time::Instant::now() + self.connection.request_timeout();
        loop {
            let state = self.evaluate_value("document.readyState").await?;
            if matches!(state.as_str(), Some("complete" | "interactive")) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }
            tokio::time::sleep(LOAD_POLL).await;
        }
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<i64>, CdpError> {
        let doc = self
            .call("DOM.getDocument", Some(json!({"depth": 0})))
            .await?;
        let root = doc["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("Missing root nodeId".to_string()))?;
        let result = self
            .call(
                "DOM.querySelector",
                Some(json!({"nodeId": root, "selector": selector})),
            )
            .await?;
        Ok(result["nodeId"].as_i64().filter(|id| *id != 0))
    }

    async fn mouse_event(&self, kind: &str, x: f64, y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": kind,
                "x": x,
                "y": y,
                "button": "left",
                "clickCount": 1,
            })),
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        self.pump.abort();
        self.connection.unregister(&self.session_id);
    }
}

#[async_trait]
impl PageAdapter for CdpPage {
    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::NavigationFailed(error.to_string()).into());
        }

        self.wait_for_load().await?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        let value = self.evaluate_value("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, PageError> {
        Ok(self.evaluate_value(script).await?)
    }

    async fn element_exists(&self, selector: &str) -> Result<bool, PageError> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        Ok(self.evaluate_value(&script).await?.as_bool().unwrap_or(false))
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>, PageError> {
        let value = self.evaluate_value(&read_text_script(selector)).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self, selector: &str) -> Result<(), PageError> {
        let node_id = self
            .query_selector(selector)
            .await?
            .ok_or_else(|| CdpError::ElementNotFound(selector.to_string()))?;

        // Best effort; the box model below decides visibility.
        let _ = self
            .call("DOM.scrollIntoViewIfNeeded", Some(json!({"nodeId": node_id})))
            .await;

        let model = self
            .call("DOM.getBoxModel", Some(json!({"nodeId": node_id})))
            .await
            .map_err(|_| CdpError::ElementNotFound(format!("{} (not visible)", selector)))?;
        let quad: Vec<f64> =
            serde_json::from_value(model["model"]["content"].clone()).map_err(CdpError::from)?;
        let (x, y) = quad_center(&quad)
            .ok_or_else(|| CdpError::ElementNotFound(format!("{} (no box)", selector)))?;

        self.mouse_event("mouseMoved", x, y).await?;
        self.mouse_event("mousePressed", x, y).await?;
        self.mouse_event("mouseReleased", x, y).await?;
        Ok(())
    }

    async fn capture_screenshot(&self) -> Result<String, PageError> {
        let result = self
            .call("Page.captureScreenshot", Some(json!({"format": "png"})))
            .await?;
        result["data"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing screenshot data".to_string()).into())
    }

    async fn expose_binding(&self, name: &str) -> Result<(), PageError> {
        self.call("Runtime.addBinding", Some(json!({"name": name})))
            .await?;
        Ok(())
    }

    async fn add_init_script(&self, script: &str) -> Result<(), PageError> {
        self.call(
            "Page.addScriptToEvaluateOnNewDocument",
            Some(json!({"source": script})),
        )
        .await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn close(&self) -> Result<(), PageError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.connection.is_alive() {
            if let Err(e) = self
                .connection
                .call("Target.closeTarget", Some(json!({"targetId": self.target_id})), None)
                .await
            {
                warn!(target_id = %self.target_id, error = %e, "Failed to close tab");
            }
        }
        self.connection.unregister(&self.session_id);
        let _ = self.events.send(PageEvent::Closed);
        Ok(())
    }
}

async fn pump_events(
    mut raw: mpsc::UnboundedReceiver<CdpResponse>,
    events: broadcast::Sender<PageEvent>,
    closed: Arc<AtomicBool>,
) {
    let mut translator = EventTranslator::new();
    while let Some(resp) = raw.recv().await {
        let (Some(method), Some(params)) = (resp.method.as_deref(), resp.params.as_ref()) else {
            continue;
        };
        if let Some(event) = translator.translate(method, params) {
            let is_close = event == PageEvent::Closed;
            let _ = events.send(event);
            if is_close {
                closed.store(true, Ordering::SeqCst);
                return;
            }
        }
    }
    // Sender dropped: target detached or the browser connection died.
    if !closed.swap(true, Ordering::SeqCst) {
        let _ = events.send(PageEvent::Closed);
    }
}

/// Quote a string as a JavaScript literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn read_text_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return null; \
         const v = ('value' in el && el.value) ? el.value : el.textContent; \
         return (v || '').trim(); }})()",
        js_string(selector)
    )
}

/// Center point of a CDP content quad.
fn quad_center(quad: &[f64]) -> Option<(f64, f64)> {
    if quad.len() < 8 {
        return None;
    }
    let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
    let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
    Some((x, y))
}
