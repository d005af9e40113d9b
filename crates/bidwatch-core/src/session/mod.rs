//! Monitoring session lifecycle.
//!
//! One [`SessionManager`] per process. It forwards commands to a single
//! worker task that owns the page and moves the session through
//! `Idle -> Navigating -> Ready -> Monitoring <-> Degraded` and on to
//! `Failed` or `Stopped`.

mod manager;
pub mod navigation;
mod worker;

pub use manager::{SessionHandle, SessionManager};
pub use navigation::{NavigationFailure, ReadyPage};

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
