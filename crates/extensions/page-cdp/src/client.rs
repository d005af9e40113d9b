//! CDP WebSocket client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::CdpError;
use crate::page::CdpPage;
use crate::protocol::{BrowserVersion, CdpRequest, CdpResponse, PageInfo};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>>;
type EventHandlers = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<CdpResponse>>>>;

/// Browser-level WebSocket shared by the client and every attached page.
pub(crate) struct Connection {
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: Pending,
    /// Event sinks keyed by CDP session id.
    event_handlers: EventHandlers,
    alive: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl Connection {
    /// Send a command and wait for its result.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        if !self.is_alive() {
            return Err(CdpError::SessionClosed);
        }
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.pending.lock().remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub(crate) fn register(&self, session_id: &str) -> mpsc::UnboundedReceiver<CdpResponse> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_handlers.lock().insert(session_id.to_string(), tx);
        rx
    }

    pub(crate) fn unregister(&self, session_id: &str) {
        self.event_handlers.lock().remove(session_id);
    }
}

/// Routes one inbound message to its pending request or its session.
fn dispatch(resp: CdpResponse, pending: &Pending, event_handlers: &EventHandlers) {
    if let Some(id) = resp.id {
        if let Some(tx) = pending.lock().remove(&id) {
            let result = match resp.error {
                Some(error) => Err(CdpError::Protocol {
                    code: error.code,
                    message: error.message,
                }),
                None => Ok(resp.result.unwrap_or(Value::Null)),
            };
            let _ = tx.send(result);
        }
        return;
    }

    let Some(method) = resp.method.as_deref() else {
        return;
    };
    if method == "Target.detachedFromTarget" {
        // Dropping the sender ends that page's event pump.
        if let Some(session_id) = resp
            .params
            .as_ref()
            .and_then(|p| p["sessionId"].as_str())
        {
            debug!(session_id, "Target detached");
            event_handlers.lock().remove(session_id);
        }
        return;
    }
    if let Some(session_id) = resp.session_id.as_deref() {
        let handlers = event_handlers.lock();
        if let Some(tx) = handlers.get(session_id) {
            let _ = tx.send(resp);
        }
    }
}

async fn receive_loop(
    mut ws_source: WsSource,
    pending: Pending,
    event_handlers: EventHandlers,
    alive: Arc<AtomicBool>,
) {
    while let Some(msg) = ws_source.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                trace!("CDP recv: {}", text);
                match serde_json::from_str::<CdpResponse>(&text) {
                    Ok(resp) => dispatch(resp, &pending, &event_handlers),
                    Err(e) => warn!("Failed to parse CDP message: {}", e),
                }
            }
            Ok(Message::Close(_)) => {
                debug!("CDP WebSocket closed");
                break;
            }
            Err(e) => {
                error!("CDP WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    alive.store(false, Ordering::SeqCst);
    // Fail in-flight calls and end every page's event pump.
    pending.lock().clear();
    event_handlers.lock().clear();
}

/// CDP client for a Chrome instance with remote debugging enabled.
pub struct CdpClient {
    /// HTTP endpoint for page discovery.
    http_endpoint: String,
    connection: Arc<Connection>,
    _recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to Chrome at the given endpoint (e.g. `http://127.0.0.1:9222`).
    pub async fn connect(endpoint: &str, request_timeout: Duration) -> Result<Self, CdpError> {
        let http_endpoint = Url::parse(endpoint)?.as_str().trim_end_matches('/').to_string();

        let version_url = format!("{}/json/version", http_endpoint);
        debug!("Fetching browser version from {}", version_url);

        let version: BrowserVersion = reqwest::get(&version_url)
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?;

        debug!("Connected to browser: {}", version.browser);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&version.web_socket_debugger_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let event_handlers: EventHandlers = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let recv_task = tokio::spawn(receive_loop(
            ws_source,
            pending.clone(),
            event_handlers.clone(),
            alive.clone(),
        ));

        debug!("CDP client connected to {}", version.web_socket_debugger_url);

        Ok(Self {
            http_endpoint,
            connection: Arc::new(Connection {
                ws_tx: tokio::sync::Mutex::new(ws_sink),
                request_id: AtomicU64::new(1),
                pending,
                event_handlers,
                alive,
                request_timeout,
            }),
            _recv_task: recv_task,
        })
    }

    /// False once the browser WebSocket has gone away.
    pub fn is_connected(&self) -> bool {
        self.connection.is_alive()
    }

    /// List all targets from the HTTP endpoint.
    pub async fn list_pages(&self) -> Result<Vec<PageInfo>, CdpError> {
        let url = format!("{}/json/list", self.http_endpoint);
        let pages: Vec<PageInfo> = reqwest::get(&url).await?.json().await?;
        Ok(pages)
    }

    /// Open a new blank tab and attach to it.
    pub async fn new_page(&self) -> Result<CdpPage, CdpError> {
        let result = self
            .connection
            .call("Target.createTarget", Some(json!({"url": "about:blank"})), None)
            .await?;
        let target_id = result["targetId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing targetId".to_string()))?;
        debug!("Created new page: {}", target_id);
        self.attach_page(target_id).await
    }

    /// Attach to an existing tab.
    pub async fn attach_page(&self, target_id: &str) -> Result<CdpPage, CdpError> {
        let result = self
            .connection
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
                None,
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        let events = self.connection.register(&session_id);
        let page = CdpPage::new(
            target_id.to_string(),
            session_id,
            self.connection.clone(),
            events,
        );
        page.enable_domains().await?;
        Ok(page)
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._recv_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (Pending, EventHandlers) {
        (
            Arc::new(Mutex::new(HashMap::new())),
            Arc::new(Mutex::new(HashMap::new())),
        )
    }

    fn parse(raw: &str) -> CdpResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_completes_pending_request() {
        let (pending, handlers) = tables();
        let (tx, rx) = oneshot::channel();
        pending.lock().insert(7, tx);

        dispatch(parse(r#"{"id":7,"result":{"ok":true}}"#), &pending, &handlers);
        assert_eq!(rx.await.unwrap().unwrap()["ok"], true);
        assert!(pending.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_maps_error_responses() {
        let (pending, handlers) = tables();
        let (tx, rx) = oneshot::channel();
        pending.lock().insert(8, tx);

        dispatch(
            parse(r#"{"id":8,"error":{"code":-32000,"message":"Cannot find context"}}"#),
            &pending,
            &handlers,
        );
        assert!(matches!(
            rx.await.unwrap(),
            Err(CdpError::Protocol { code: -32000, .. })
        ));
    }

    #[test]
    fn test_dispatch_routes_events_by_session() {
        let (pending, handlers) = tables();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        handlers.lock().insert("A".to_string(), tx_a);
        handlers.lock().insert("B".to_string(), tx_b);

        dispatch(
            parse(r#"{"method":"Page.frameNavigated","params":{},"sessionId":"B"}"#),
            &pending,
            &handlers,
        );
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap().method.as_deref(), Some("Page.frameNavigated"));
    }

    #[test]
    fn test_detached_target_drops_its_handler() {
        let (pending, handlers) = tables();
        let (tx, mut rx) = mpsc::unbounded_channel();
        handlers.lock().insert("A".to_string(), tx);

        dispatch(
            parse(r#"{"method":"Target.detachedFromTarget","params":{"sessionId":"A"}}"#),
            &pending,
            &handlers,
        );
        assert!(handlers.lock().is_empty());
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
