//! WebSocket data plane.
//!
//! Every connection is a hub subscription: the viewer first receives
//! `connected` and a `snapshot`, then live `state_update` / `status_changed`
//! frames. Viewers may send `ping`, `ack` and `action` frames back.

mod handler;
mod message;

pub use handler::{handle_client_message, ws_handler};
pub use message::{ActionRequest, ClientMessage, ServerMessage, WireError};
