//! Configuration schema definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod schema_observer;
mod schema_selectors;
mod schema_session;

pub use schema_observer::*;
pub use schema_selectors::*;
pub use schema_session::*;

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub observer: ObserverConfig,

    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    #[serde(default)]
    pub selectors: SelectorsConfig,

    #[serde(default)]
    pub actions: ActionsConfig,

    #[serde(default)]
    pub hub: HubConfig,
}

/// Control-plane server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Browser (CDP) connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Remote debugging endpoint of an already running Chrome.
    #[serde(default = "default_cdp_endpoint")]
    pub endpoint: String,

    /// Attach to an existing tab whose URL contains this string instead of
    /// opening a new one. Useful when the logged-in tab is already open.
    #[serde(default)]
    pub attach_url_contains: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: default_cdp_endpoint(),
            attach_url_contains: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BrowserConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_cdp_endpoint() -> String {
    "http://127.0.0.1:9222".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Broadcast hub and internal queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Outbound queue per viewer connection. Overflow disconnects the viewer.
    #[serde(default = "default_connection_queue")]
    pub connection_queue: usize,

    /// Worker-to-hub relay event queue.
    #[serde(default = "default_event_queue")]
    pub event_queue: usize,

    /// Control-plane command queue into the session worker.
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            connection_queue: default_connection_queue(),
            event_queue: default_event_queue(),
            command_queue: default_command_queue(),
        }
    }
}

fn default_connection_queue() -> usize {
    256
}

fn default_event_queue() -> usize {
    1024
}

fn default_command_queue() -> usize {
    32
}
