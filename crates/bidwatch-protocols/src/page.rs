//! Page protocol definitions.
//!
//! A [`PageAdapter`] is the only way the relay touches the browser. The core
//! never knows which automation backend sits behind it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::PageError;

/// Raw events a page pushes to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// An in-page script invoked an exposed binding.
    BindingCalled { name: String, payload: String },
    /// A WebSocket frame arrived on the page.
    SocketFrame { url: String, payload: String },
    /// The main frame navigated; in-page scripts are gone.
    Navigated { url: String },
    /// The page or its transport went away.
    Closed,
}

/// Capability boundary over a live browser page.
#[async_trait]
pub trait PageAdapter: Send + Sync {
    /// Navigate the main frame and wait for the load to finish.
    async fn navigate(&self, url: &str) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    /// Evaluate a script and return its JSON-serializable result.
    async fn evaluate(&self, script: &str) -> Result<Value, PageError>;

    async fn element_exists(&self, selector: &str) -> Result<bool, PageError>;

    /// Trimmed text content (or value) of the first element matching `selector`.
    async fn read_text(&self, selector: &str) -> Result<Option<String>, PageError>;

    async fn click(&self, selector: &str) -> Result<(), PageError>;

    /// PNG screenshot, base64-encoded.
    async fn capture_screenshot(&self) -> Result<String, PageError>;

    /// Expose a named callback that in-page scripts can invoke with a string.
    async fn expose_binding(&self, name: &str) -> Result<(), PageError>;

    /// Script evaluated before any page script on every new document.
    async fn add_init_script(&self, script: &str) -> Result<(), PageError>;

    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    /// Release the page. Further calls fail with [`PageError::Closed`].
    async fn close(&self) -> Result<(), PageError>;
}

/// Supplies an authenticated page for a new monitoring session.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn PageAdapter>, PageError>;
}
