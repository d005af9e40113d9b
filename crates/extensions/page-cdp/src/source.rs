//! Page source backed by a running Chrome.

use std::sync::Arc;

use async_trait::async_trait;
use bidwatch_config::BrowserConfig;
use bidwatch_protocols::{PageAdapter, PageError, PageSource};
use tokio::sync::Mutex;
use tracing::info;

use crate::client::CdpClient;
use crate::error::CdpError;
use crate::protocol::PageInfo;

/// Opens a fresh tab per session, or attaches to an already open tab whose
/// URL contains `attach_url_contains`.
///
/// The browser connection is made lazily and re-established if Chrome was
/// restarted between sessions.
pub struct CdpPageSource {
    config: BrowserConfig,
    client: Mutex<Option<Arc<CdpClient>>>,
}

impl CdpPageSource {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    /// Connect now instead of on the first `open`.
    pub async fn connect(&self) -> Result<(), CdpError> {
        self.client().await.map(|_| ())
    }

    async fn client(&self) -> Result<Arc<CdpClient>, CdpError> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref().filter(|c| c.is_connected()) {
            return Ok(client.clone());
        }
        let client = Arc::new(
            CdpClient::connect(&self.config.endpoint, self.config.request_timeout()).await?,
        );
        info!(endpoint = %self.config.endpoint, "Connected to browser");
        *slot = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl PageSource for CdpPageSource {
    async fn open(&self) -> Result<Arc<dyn PageAdapter>, PageError> {
        let client = self.client().await?;
        let page = match self.config.attach_url_contains.as_deref() {
            Some(needle) => {
                let pages = client.list_pages().await?;
                let target = pick_attach_target(&pages, needle)
                    .ok_or_else(|| CdpError::NoMatchingTab(needle.to_string()))?;
                info!(target_id = %target.id, url = %target.url, "Attaching to existing tab");
                client.attach_page(&target.id).await?
            }
            None => client.new_page().await?,
        };
        Ok(Arc::new(page))
    }
}

/// First regular tab whose URL contains `needle`.
fn pick_attach_target<'a>(pages: &'a [PageInfo], needle: &str) -> Option<&'a PageInfo> {
    pages
        .iter()
        .find(|p| p.page_type == "page" && p.url.contains(needle))
}
