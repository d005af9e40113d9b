//! CDP protocol types and event translation.

use std::collections::HashMap;

use bidwatch_protocols::PageEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP request message.
#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP response or event message.
#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorResponse>,
    pub method: Option<String>,
    pub params: Option<Value>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP error in response.
#[derive(Debug, Deserialize)]
pub struct CdpErrorResponse {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// Page info from the `/json` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub title: String,
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Browser version info.
///
/// Note: Chrome returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// Turns raw CDP events for one page session into [`PageEvent`]s.
///
/// Socket frames only carry a request id, so the URL of each page WebSocket
/// is remembered from `Network.webSocketCreated`.
#[derive(Debug, Default)]
pub struct EventTranslator {
    socket_urls: HashMap<String, String>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, method: &str, params: &Value) -> Option<PageEvent> {
        match method {
            "Runtime.bindingCalled" => Some(PageEvent::BindingCalled {
                name: params["name"].as_str()?.to_string(),
                payload: params["payload"].as_str().unwrap_or_default().to_string(),
            }),
            "Network.webSocketCreated" => {
                let id = params["requestId"].as_str()?;
                let url = params["url"].as_str()?;
                self.socket_urls.insert(id.to_string(), url.to_string());
                None
            }
            "Network.webSocketClosed" => {
                let id = params["requestId"].as_str()?;
                self.socket_urls.remove(id);
                None
            }
            "Network.webSocketFrameReceived" => {
                let id = params["requestId"].as_str()?;
                Some(PageEvent::SocketFrame {
                    url: self.socket_urls.get(id).cloned().unwrap_or_default(),
                    payload: params["response"]["payloadData"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                })
            }
            // Sub-frames carry a parentId; only the main frame matters.
            "Page.frameNavigated" if params["frame"].get("parentId").is_none() => {
                Some(PageEvent::Navigated {
                    url: params["frame"]["url"].as_str().unwrap_or_default().to_string(),
                })
            }
            "Inspector.detached" | "Inspector.targetCrashed" => Some(PageEvent::Closed),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
