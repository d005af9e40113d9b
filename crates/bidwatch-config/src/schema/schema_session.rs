//! Session lifecycle configuration: navigation, readiness, block detection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL used to resolve relative auction URLs.
    #[serde(default)]
    pub site_base_url: Option<String>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Per-attempt navigation timeout.
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,

    /// Ordered list; the first selector present marks the page ready.
    #[serde(default = "default_ready_selectors")]
    pub ready_selectors: Vec<String>,

    /// Interstitials (e.g. leave-auction confirmation) clicked once after readiness.
    #[serde(default = "default_dismiss_selectors")]
    pub dismiss_selectors: Vec<String>,

    #[serde(default)]
    pub block_markers: BlockMarkers,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            site_base_url: None,
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
            ready_poll_ms: default_ready_poll_ms(),
            ready_selectors: default_ready_selectors(),
            dismiss_selectors: default_dismiss_selectors(),
            block_markers: BlockMarkers::default(),
        }
    }
}

impl SessionConfig {
    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    15_000
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_ready_timeout_secs() -> u64 {
    20
}

fn default_ready_poll_ms() -> u64 {
    500
}

fn default_ready_selectors() -> Vec<String> {
    [
        ".auctionrunningdiv-MACRO",
        "iframe[src*='g2auction']",
        ".current-bid",
        ".bid-amount",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_dismiss_selectors() -> Vec<String> {
    [
        "#LeaveAuctionConfirmationOk",
        "button[data-actionname='LeaveAuctionConfirmationOk']",
        "#LeaveAuctionConfirmationOkVCB",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Signatures of bot-protection interstitials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMarkers {
    /// Case-insensitive substrings of the page title or body text.
    #[serde(default = "default_block_texts")]
    pub texts: Vec<String>,

    /// Structural markers; any match blocks.
    #[serde(default = "default_block_selectors")]
    pub selectors: Vec<String>,
}

impl Default for BlockMarkers {
    fn default() -> Self {
        Self {
            texts: default_block_texts(),
            selectors: default_block_selectors(),
        }
    }
}

fn default_block_texts() -> Vec<String> {
    [
        "Access Denied",
        "Request unsuccessful. Incapsula incident",
        "Pardon Our Interruption",
        "Checking your browser before accessing",
        "Please verify you are a human",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_block_selectors() -> Vec<String> {
    [
        "iframe[src*='hcaptcha']",
        "iframe[src*='recaptcha']",
        "iframe[src*='_Incapsula_Resource']",
        "#challenge-form",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
