//! Auction state types.
//!
//! [`AuctionFields`] is the partial, per-extraction view of the auction;
//! [`AuctionState`] is the published, sequenced snapshot viewers see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "auction_tests.rs"]
mod tests;

/// Lifecycle of a lot as shown by the auction site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Pending,
    Live,
    Ending,
    Closed,
}

impl AuctionStatus {
    /// Classify free-form status text from the page or a network payload.
    ///
    /// Returns `None` when the text carries no recognizable status keyword.
    pub fn from_text(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }

        const CLOSED: &[&str] = &["ended", "closed", "sold", "finished", "complete"];
        const ENDING: &[&str] = &["ending", "going", "last call", "final call"];
        const LIVE: &[&str] = &["live", "active", "running", "open", "bidding"];
        const PENDING: &[&str] = &[
            "pending",
            "upcoming",
            "not started",
            "scheduled",
            "paused",
            "waiting",
        ];

        let matches = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if matches(CLOSED) {
            Some(Self::Closed)
        } else if matches(ENDING) {
            Some(Self::Ending)
        } else if matches(LIVE) {
            Some(Self::Live)
        } else if matches(PENDING) {
            Some(Self::Pending)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Live => "live",
            Self::Ending => "ending",
            Self::Closed => "closed",
        }
    }
}

/// A possibly partial set of auction fields.
///
/// Produced by extraction strategies and used as the `changes` payload of a
/// [`StateDiff`]. Absent fields are omitted from the wire form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_bid: Option<f64>,
    /// Name or location of the current high bidder as the site shows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_bidder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AuctionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidder_count: Option<u32>,
}

impl AuctionFields {
    pub fn is_empty(&self) -> bool {
        self.lot_id.is_none()
            && self.current_bid.is_none()
            && self.current_bidder.is_none()
            && self.time_remaining.is_none()
            && self.status.is_none()
            && self.bidder_count.is_none()
    }

    /// A complete field set is one that can be published on its own:
    /// lot, current bid and status are all known.
    pub fn is_complete(&self) -> bool {
        self.lot_id.is_some() && self.current_bid.is_some() && self.status.is_some()
    }

    /// Overwrite fields with every value present in `other`.
    pub fn overlay(&mut self, other: &AuctionFields) {
        if other.lot_id.is_some() {
            self.lot_id.clone_from(&other.lot_id);
        }
        if other.current_bid.is_some() {
            self.current_bid = other.current_bid;
        }
        if other.current_bidder.is_some() {
            self.current_bidder.clone_from(&other.current_bidder);
        }
        if other.time_remaining.is_some() {
            self.time_remaining.clone_from(&other.time_remaining);
        }
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.bidder_count.is_some() {
            self.bidder_count = other.bidder_count;
        }
    }

    /// Fill only the fields that are still missing.
    pub fn fill_missing(&mut self, other: &AuctionFields) {
        if self.lot_id.is_none() {
            self.lot_id.clone_from(&other.lot_id);
        }
        if self.current_bid.is_none() {
            self.current_bid = other.current_bid;
        }
        if self.current_bidder.is_none() {
            self.current_bidder.clone_from(&other.current_bidder);
        }
        if self.time_remaining.is_none() {
            self.time_remaining.clone_from(&other.time_remaining);
        }
        if self.status.is_none() {
            self.status = other.status;
        }
        if self.bidder_count.is_none() {
            self.bidder_count = other.bidder_count;
        }
    }
}

/// Canonical auction snapshot published to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionState {
    pub lot_id: String,
    pub current_bid: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_bidder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<String>,
    pub status: AuctionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidder_count: Option<u32>,
    pub sequence: u64,
    pub observed_at: DateTime<Utc>,
}

impl AuctionState {
    /// Build a state from a complete field set. Returns `None` if required
    /// fields are missing.
    pub fn from_fields(
        fields: &AuctionFields,
        sequence: u64,
        observed_at: DateTime<Utc>,
    ) -> Option<Self> {
        Some(Self {
            lot_id: fields.lot_id.clone()?,
            current_bid: fields.current_bid?,
            current_bidder: fields.current_bidder.clone(),
            time_remaining: fields.time_remaining.clone(),
            status: fields.status?,
            bidder_count: fields.bidder_count,
            sequence,
            observed_at,
        })
    }

    /// The observable fields of this state, without sequencing metadata.
    pub fn fields(&self) -> AuctionFields {
        AuctionFields {
            lot_id: Some(self.lot_id.clone()),
            current_bid: Some(self.current_bid),
            current_bidder: self.current_bidder.clone(),
            time_remaining: self.time_remaining.clone(),
            status: Some(self.status),
            bidder_count: self.bidder_count,
        }
    }

    /// Fields that differ from `previous`. With no previous state every
    /// field counts as changed.
    pub fn diff_from(&self, previous: Option<&AuctionState>) -> StateDiff {
        let current = self.fields();
        let changes = match previous {
            None => current,
            Some(prev) => {
                let prev = prev.fields();
                AuctionFields {
                    lot_id: changed(&current.lot_id, &prev.lot_id),
                    current_bid: changed(&current.current_bid, &prev.current_bid),
                    current_bidder: changed(&current.current_bidder, &prev.current_bidder),
                    time_remaining: changed(&current.time_remaining, &prev.time_remaining),
                    status: changed(&current.status, &prev.status),
                    bidder_count: changed(&current.bidder_count, &prev.bidder_count),
                }
            }
        };
        StateDiff {
            sequence: self.sequence,
            changes,
        }
    }
}

fn changed<T: Clone + PartialEq>(current: &Option<T>, previous: &Option<T>) -> Option<T> {
    if current != previous {
        current.clone()
    } else {
        None
    }
}

/// Fields that changed in one published state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    pub sequence: u64,
    pub changes: AuctionFields,
}
