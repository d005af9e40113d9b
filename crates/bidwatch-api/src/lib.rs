//! # BidWatch API
//!
//! External surface of the relay:
//! - **HTTP**: control plane (start/stop session, status, actions, diagnostics)
//! - **WebSocket**: per-viewer push of snapshots, diffs and status changes
//! - **Hub**: fan-out of relay events to every subscribed viewer
//!
//! ```text
//!   viewers ──ws──┐            ┌── HTTP control
//!                 ▼            ▼
//!            BroadcastHub   SessionManager ──commands──▶ session worker ──▶ page
//!                 ▲                                          │
//!                 └──────────────── relay events ────────────┘
//! ```

pub mod error;
pub mod http;
pub mod hub;
pub mod server;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use http::routes::create_router;
pub use hub::{BroadcastHub, Subscription};
pub use server::ApiServer;
pub use state::AppState;
pub use websocket::{ActionRequest, ClientMessage, ServerMessage, WireError};
