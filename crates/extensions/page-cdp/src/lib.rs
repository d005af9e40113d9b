//! Chrome DevTools Protocol page adapter.
//!
//! Connects to a Chrome already running with remote debugging (and already
//! logged in to the auction site) and exposes one of its tabs as a
//! [`PageAdapter`](bidwatch_protocols::PageAdapter).
//!
//! ## Usage
//!
//! 1. Start Chrome with remote debugging:
//!    ```bash
//!    chrome --remote-debugging-port=9222
//!    ```
//!
//! 2. Hand a source to the session manager:
//!    ```rust,ignore
//!    let source = CdpPageSource::new(config.browser.clone());
//!    let (manager, worker) = SessionManager::spawn(config, Arc::new(source), events);
//!    ```

mod client;
mod error;
mod page;
mod protocol;
mod source;

pub use client::CdpClient;
pub use error::CdpError;
pub use page::CdpPage;
pub use protocol::{BrowserVersion, CdpRequest, CdpResponse, EventTranslator, PageInfo};
pub use source::CdpPageSource;
