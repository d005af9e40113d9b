//! Ordered fallback selector tables.
//!
//! Every list is tried in order and the first match wins.

use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorsConfig {
    #[serde(default)]
    pub fields: FieldSelectors,

    #[serde(default)]
    pub elements: ElementSelectors,
}

/// Selectors per logical auction field, read by the in-page scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSelectors {
    #[serde(default = "default_lot_id_selectors")]
    pub lot_id: Vec<String>,

    #[serde(default = "default_current_bid_selectors")]
    pub current_bid: Vec<String>,

    #[serde(default = "default_current_bidder_selectors")]
    pub current_bidder: Vec<String>,

    #[serde(default = "default_time_remaining_selectors")]
    pub time_remaining: Vec<String>,

    #[serde(default = "default_status_selectors")]
    pub status: Vec<String>,

    #[serde(default = "default_bidder_count_selectors")]
    pub bidder_count: Vec<String>,
}

impl Default for FieldSelectors {
    fn default() -> Self {
        Self {
            lot_id: default_lot_id_selectors(),
            current_bid: default_current_bid_selectors(),
            current_bidder: default_current_bidder_selectors(),
            time_remaining: default_time_remaining_selectors(),
            status: default_status_selectors(),
            bidder_count: default_bidder_count_selectors(),
        }
    }
}

fn default_lot_id_selectors() -> Vec<String> {
    strings(&[".lot-number", ".lot-id", "[data-uname*='lotNumber']"])
}

fn default_current_bid_selectors() -> Vec<String> {
    strings(&[
        ".current-bid",
        ".bid-amount",
        ".bid-price",
        "[data-uname*='currentBid']",
    ])
}

fn default_current_bidder_selectors() -> Vec<String> {
    strings(&[".current-bidder", ".bidder-name", ".winning-bidder"])
}

fn default_time_remaining_selectors() -> Vec<String> {
    strings(&[
        ".time-remaining",
        ".countdown",
        ".time-left",
        "[data-uname*='time']",
        ".countdown-timer",
        ".auction-timer",
        ".time-display",
        "[class*='countdown']",
        "[class*='timer']",
    ])
}

fn default_status_selectors() -> Vec<String> {
    strings(&[".auction-status", ".status", ".auction-state"])
}

fn default_bidder_count_selectors() -> Vec<String> {
    strings(&[".active-bidders", ".bidder-count", ".bidders-online"])
}

/// Selectors per element role targeted by actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSelectors {
    #[serde(default = "default_bid_button_selectors")]
    pub bid_button: Vec<String>,

    #[serde(default = "default_plus_button_selectors")]
    pub plus_button: Vec<String>,

    #[serde(default = "default_bid_input_selectors")]
    pub bid_input: Vec<String>,
}

impl Default for ElementSelectors {
    fn default() -> Self {
        Self {
            bid_button: default_bid_button_selectors(),
            plus_button: default_plus_button_selectors(),
            bid_input: default_bid_input_selectors(),
        }
    }
}

fn default_bid_button_selectors() -> Vec<String> {
    strings(&[
        "button[data-uname*='bid']",
        ".bid-button",
        "button[class*='bid']",
    ])
}

fn default_plus_button_selectors() -> Vec<String> {
    strings(&[
        "button[data-uname*='plus']",
        "button[data-uname*='increase']",
        ".plus-button",
        "button[class*='plus']",
    ])
}

fn default_bid_input_selectors() -> Vec<String> {
    strings(&[
        "input[name='bidAmount']",
        "input[data-uname*='bidAmount']",
        ".bid-input input",
    ])
}

/// JSON field paths (dot separated) tried per field in network payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkFieldPaths {
    #[serde(default = "default_lot_id_paths")]
    pub lot_id: Vec<String>,

    #[serde(default = "default_current_bid_paths")]
    pub current_bid: Vec<String>,

    #[serde(default = "default_current_bidder_paths")]
    pub current_bidder: Vec<String>,

    #[serde(default = "default_time_remaining_paths")]
    pub time_remaining: Vec<String>,

    #[serde(default = "default_status_paths")]
    pub status: Vec<String>,

    #[serde(default = "default_bidder_count_paths")]
    pub bidder_count: Vec<String>,
}

impl Default for NetworkFieldPaths {
    fn default() -> Self {
        Self {
            lot_id: default_lot_id_paths(),
            current_bid: default_current_bid_paths(),
            current_bidder: default_current_bidder_paths(),
            time_remaining: default_time_remaining_paths(),
            status: default_status_paths(),
            bidder_count: default_bidder_count_paths(),
        }
    }
}

fn default_lot_id_paths() -> Vec<String> {
    strings(&["lotId", "lot_id", "lotNumber", "lot.id", "data.lotId"])
}

fn default_current_bid_paths() -> Vec<String> {
    strings(&[
        "currentBid",
        "current_bid",
        "highBid",
        "bid.amount",
        "data.currentBid",
    ])
}

fn default_current_bidder_paths() -> Vec<String> {
    strings(&[
        "currentBidder",
        "current_bidder",
        "highBidder",
        "bid.bidder",
        "data.currentBidder",
    ])
}

fn default_time_remaining_paths() -> Vec<String> {
    strings(&["timeRemaining", "time_remaining", "timeLeft", "data.timeRemaining"])
}

fn default_status_paths() -> Vec<String> {
    strings(&["status", "auctionStatus", "state", "data.status"])
}

fn default_bidder_count_paths() -> Vec<String> {
    strings(&["bidderCount", "bidder_count", "activeBidders", "data.bidderCount"])
}
