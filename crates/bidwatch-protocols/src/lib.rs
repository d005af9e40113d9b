//! # BidWatch Protocols
//!
//! Shared definitions for the BidWatch auction relay. Contains only types,
//! traits and errors - no implementations.
//!
//! ## Core Traits
//!
//! - [`PageAdapter`] - Capability boundary over a live, externally controlled browser page
//! - [`PageSource`] - Supplies an authenticated page to a monitoring session
//!
//! ## Core Types
//!
//! - [`AuctionState`] - Canonical, sequenced snapshot of the auction
//! - [`MonitorSession`] - Lifecycle record of one monitored auction
//! - [`ObservedEvent`] - Raw, untrusted input captured from the page
//! - [`RelayEvent`] - What the session worker publishes to the broadcast hub

pub mod action;
pub mod auction;
pub mod error;
pub mod event;
pub mod page;
pub mod session;

pub use action::{ActionAck, ActionKind, ElementRole};
pub use auction::{AuctionFields, AuctionState, AuctionStatus, StateDiff};
pub use error::{
    ActionError, BlockedError, ExtractionError, NavigationError, PageError, ProtocolError,
    RelayError, SessionConflict,
};
pub use event::{EventSource, ObservedEvent, RelayEvent};
pub use page::{PageAdapter, PageEvent, PageSource};
pub use session::{DiagnosticCapture, FailureInfo, FailureKind, MonitorSession, SessionStatus};
