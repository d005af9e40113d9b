//! # BidWatch Core
//!
//! The single-owner session worker and everything it drives:
//!
//! - [`SessionManager`] - control-plane handle; serializes commands into the worker
//! - [`ObserverBridge`] - installs in-page watchers and forwards raw events
//! - [`StateReconciler`] - turns raw events into sequenced [`AuctionState`]s
//! - [`ActionRelay`] - highlight / prepare actions with timed revert
//!
//! [`AuctionState`]: bidwatch_protocols::AuctionState

pub mod actions;
pub mod bridge;
pub mod reconciler;
pub mod selectors;
pub mod session;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use actions::{ActionRelay, PendingAction, HIGHLIGHT_DURATION};
pub use bridge::{BridgeSignal, ObserverBridge};
pub use reconciler::{ExtractionStrategy, StateReconciler};
pub use selectors::SelectorTable;
pub use session::{SessionHandle, SessionManager};
