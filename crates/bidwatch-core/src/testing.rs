//! Scripted in-memory page for tests.
//!
//! `ScriptedPage` answers element lookups from a selector map, returns a
//! configurable payload for the scrape script and records every call so tests
//! can assert on what the relay did to the page.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bidwatch_protocols::{PageAdapter, PageError, PageEvent, PageSource};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::bridge::scripts::{OBSERVER_MARKER, SCRAPE_MARKER};
use crate::session::navigation::PAGE_TEXT_SCRIPT;

#[derive(Default)]
struct ScriptedState {
    elements: HashMap<String, String>,
    title: String,
    body_text: String,
    scrape: Value,
    navigate_results: VecDeque<Result<(), PageError>>,
    navigate_delay: Option<Duration>,
    eval_delay: Option<Duration>,
    navigations: Vec<String>,
    evaluations: Vec<String>,
    clicks: Vec<String>,
    bindings: Vec<String>,
    init_scripts: Vec<String>,
    url: String,
    closed: bool,
}

pub struct ScriptedPage {
    state: Mutex<ScriptedState>,
    events: broadcast::Sender<PageEvent>,
}

impl ScriptedPage {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            state: Mutex::new(ScriptedState {
                scrape: json!({"kind": "mutation", "fields": {}, "text": ""}),
                ..Default::default()
            }),
            events,
        })
    }

    /// A page showing a live auction that satisfies the default ready selectors.
    pub fn live_auction(lot: &str, bid: f64) -> Arc<Self> {
        let page = Self::new();
        page.set_element(".auctionrunningdiv-MACRO", "");
        page.set_element("button[data-uname*='bid']", "Bid");
        page.set_element("button[data-uname*='plus']", "+");
        page.set_element("input[name='bidAmount']", "");
        page.set_scrape_fields(json!({
            "lotId": lot,
            "currentBid": format!("${bid}"),
            "status": "Live",
        }));
        page
    }

    pub fn set_element(&self, selector: &str, text: &str) {
        self.state
            .lock()
            .elements
            .insert(selector.to_string(), text.to_string());
    }

    pub fn remove_element(&self, selector: &str) {
        self.state.lock().elements.remove(selector);
    }

    pub fn set_body_text(&self, text: &str) {
        self.state.lock().body_text = text.to_string();
    }

    pub fn set_title(&self, title: &str) {
        self.state.lock().title = title.to_string();
    }

    /// Value returned by the scrape script.
    pub fn set_scrape(&self, value: Value) {
        self.state.lock().scrape = value;
    }

    pub fn set_scrape_fields(&self, fields: Value) {
        self.set_scrape(json!({"kind": "mutation", "fields": fields, "text": ""}));
    }

    /// Queue the result of the next `navigate` call. Unqueued calls succeed.
    pub fn push_navigate_result(&self, result: Result<(), PageError>) {
        self.state.lock().navigate_results.push_back(result);
    }

    pub fn set_navigate_delay(&self, delay: Duration) {
        self.state.lock().navigate_delay = Some(delay);
    }

    pub fn set_eval_delay(&self, delay: Option<Duration>) {
        self.state.lock().eval_delay = delay;
    }

    pub fn emit(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }

    /// Fire the exposed binding the way the in-page observer would.
    pub fn emit_binding(&self, name: &str, payload: Value) {
        self.emit(PageEvent::BindingCalled {
            name: name.to_string(),
            payload: payload.to_string(),
        });
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn evaluations(&self) -> Vec<String> {
        self.state.lock().evaluations.clone()
    }

    pub fn evaluations_containing(&self, needle: &str) -> usize {
        self.state
            .lock()
            .evaluations
            .iter()
            .filter(|s| s.contains(needle))
            .count()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub fn bindings(&self) -> Vec<String> {
        self.state.lock().bindings.clone()
    }

    pub fn init_scripts(&self) -> Vec<String> {
        self.state.lock().init_scripts.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn ensure_open(&self) -> Result<(), PageError> {
        if self.state.lock().closed {
            Err(PageError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageAdapter for ScriptedPage {
    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        self.ensure_open()?;
        let (delay, result) = {
            let mut state = self.state.lock();
            state.navigations.push(url.to_string());
            state.url = url.to_string();
            (
                state.navigate_delay,
                state.navigate_results.pop_front().unwrap_or(Ok(())),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.ensure_open()?;
        Ok(self.state.lock().url.clone())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, PageError> {
        self.ensure_open()?;
        let delay = {
            let mut state = self.state.lock();
            state.evaluations.push(script.to_string());
            state.eval_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        if script == PAGE_TEXT_SCRIPT {
            return Ok(json!({"title": state.title, "text": state.body_text}));
        }
        if script.contains(SCRAPE_MARKER) {
            return Ok(state.scrape.clone());
        }
        if script.contains(OBSERVER_MARKER) {
            return Ok(json!("installed"));
        }
        Ok(Value::Bool(true))
    }

    async fn element_exists(&self, selector: &str) -> Result<bool, PageError> {
        self.ensure_open()?;
        Ok(self.state.lock().elements.contains_key(selector))
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>, PageError> {
        self.ensure_open()?;
        Ok(self.state.lock().elements.get(selector).cloned())
    }

    async fn click(&self, selector: &str) -> Result<(), PageError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        if !state.elements.contains_key(selector) {
            return Err(PageError::ElementNotFound(selector.to_string()));
        }
        state.clicks.push(selector.to_string());
        Ok(())
    }

    async fn capture_screenshot(&self) -> Result<String, PageError> {
        self.ensure_open()?;
        // "PNG" magic bytes, base64-encoded.
        Ok("iVBORw0KGgo=".to_string())
    }

    async fn expose_binding(&self, name: &str) -> Result<(), PageError> {
        self.ensure_open()?;
        self.state.lock().bindings.push(name.to_string());
        Ok(())
    }

    async fn add_init_script(&self, script: &str) -> Result<(), PageError> {
        self.ensure_open()?;
        self.state.lock().init_scripts.push(script.to_string());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn close(&self) -> Result<(), PageError> {
        self.state.lock().closed = true;
        let _ = self.events.send(PageEvent::Closed);
        Ok(())
    }
}

/// Hands out the same scripted page on every `open`.
pub struct ScriptedSource {
    page: Arc<ScriptedPage>,
    opens: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(page: Arc<ScriptedPage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            opens: AtomicUsize::new(0),
        })
    }

    pub fn page(&self) -> &Arc<ScriptedPage> {
        &self.page
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn open(&self) -> Result<Arc<dyn PageAdapter>, PageError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        // A reopened page is usable again, like a fresh tab.
        self.page.state.lock().closed = false;
        Ok(self.page.clone())
    }
}
