//! Observer, reconciler and action configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::NetworkFieldPaths;

/// In-page observer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Ordered candidates for the mutation watcher's root element.
    #[serde(default = "default_root_selectors")]
    pub root_selectors: Vec<String>,

    /// Name of the callback exposed to in-page scripts.
    #[serde(default = "default_binding_name")]
    pub binding_name: String,

    /// URL substrings identifying auction-protocol traffic.
    #[serde(default = "default_network_filters")]
    pub network_filters: Vec<String>,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upper bound on visible text shipped with each mutation batch.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// In-page retry interval while the root element is missing.
    #[serde(default = "default_root_retry_ms")]
    pub root_retry_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            root_selectors: default_root_selectors(),
            binding_name: default_binding_name(),
            network_filters: default_network_filters(),
            queue_capacity: default_queue_capacity(),
            max_text_chars: default_max_text_chars(),
            root_retry_ms: default_root_retry_ms(),
        }
    }
}

fn default_root_selectors() -> Vec<String> {
    [".auctionrunningdiv-MACRO", "#auctionRunningDiv", "main", "body"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_binding_name() -> String {
    "__bidwatchEmit".to_string()
}

fn default_network_filters() -> Vec<String> {
    ["g2auction", "/auction/", "socket.io", "/bid"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_text_chars() -> usize {
    4000
}

fn default_root_retry_ms() -> u64 {
    1000
}

/// State reconciliation timing and network field mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,

    #[serde(default = "default_staleness_window_secs")]
    pub staleness_window_secs: u64,

    /// Scrape interval while healthy.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Scrape interval while degraded.
    #[serde(default = "default_fallback_poll_interval_secs")]
    pub fallback_poll_interval_secs: u64,

    /// Worker housekeeping tick.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default)]
    pub network_fields: NetworkFieldPaths,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: default_coalesce_window_ms(),
            staleness_window_secs: default_staleness_window_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
            fallback_poll_interval_secs: default_fallback_poll_interval_secs(),
            tick_ms: default_tick_ms(),
            network_fields: NetworkFieldPaths::default(),
        }
    }
}

impl ReconcilerConfig {
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn fallback_poll_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_poll_interval_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

fn default_coalesce_window_ms() -> u64 {
    150
}

fn default_staleness_window_secs() -> u64 {
    45
}

fn default_health_check_interval_secs() -> u64 {
    30
}

fn default_fallback_poll_interval_secs() -> u64 {
    2
}

fn default_tick_ms() -> u64 {
    500
}

/// Action relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "default_action_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub highlight: HighlightStyle,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_action_timeout_ms(),
            highlight: HighlightStyle::default(),
        }
    }
}

impl ActionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_action_timeout_ms() -> u64 {
    5000
}

/// Colors applied to highlighted elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightStyle {
    #[serde(default = "default_bid_background")]
    pub bid_background: String,

    #[serde(default = "default_bid_border")]
    pub bid_border: String,

    #[serde(default = "default_plus_background")]
    pub plus_background: String,

    #[serde(default = "default_plus_border")]
    pub plus_border: String,

    #[serde(default = "default_text_color")]
    pub text_color: String,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            bid_background: default_bid_background(),
            bid_border: default_bid_border(),
            plus_background: default_plus_background(),
            plus_border: default_plus_border(),
            text_color: default_text_color(),
        }
    }
}

fn default_bid_background() -> String {
    "#0066ff".to_string()
}

fn default_bid_border() -> String {
    "#003399".to_string()
}

fn default_plus_background() -> String {
    "#ff4444".to_string()
}

fn default_plus_border() -> String {
    "#cc0000".to_string()
}

fn default_text_color() -> String {
    "#ffffff".to_string()
}
