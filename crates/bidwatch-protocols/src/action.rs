//! Viewer-issued actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;

/// Logical page element an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRole {
    BidButton,
    PlusButton,
    BidInput,
}

impl ElementRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BidButton => "bid_button",
            Self::PlusButton => "plus_button",
            Self::BidInput => "bid_input",
        }
    }
}

impl std::fmt::Display for ElementRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action a viewer can request against the live page.
///
/// None of these submit a bid. `PrepareBid` stages an amount and highlights
/// the bid button for a human to confirm. `Locate` only reports which
/// selector currently resolves for a role and leaves the page untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    HighlightBidButton,
    HighlightPlusButton,
    ClickPlus,
    PrepareBid { amount: f64 },
    Locate { role: ElementRole },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HighlightBidButton => "highlight_bid_button",
            Self::HighlightPlusButton => "highlight_plus_button",
            Self::ClickPlus => "click_plus",
            Self::PrepareBid { .. } => "prepare_bid",
            Self::Locate { .. } => "locate",
        }
    }

    /// The role whose highlight this action leaves pending, if any.
    pub fn highlight_role(&self) -> Option<ElementRole> {
        match self {
            Self::HighlightBidButton | Self::PrepareBid { .. } => Some(ElementRole::BidButton),
            Self::HighlightPlusButton | Self::ClickPlus => Some(ElementRole::PlusButton),
            Self::Locate { .. } => None,
        }
    }
}

/// Successful action acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionAck {
    pub kind: String,
    pub role: ElementRole,
    pub selector: String,
    /// True when the request merged into an already pending highlight.
    pub coalesced: bool,
    /// When the highlight is reverted. Absent for read-only actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_at: Option<DateTime<Utc>>,
}
