//! Error types for the BidWatch relay.

mod action;
mod navigation;
mod page;
mod relay;

pub use action::*;
pub use navigation::*;
pub use page::*;
pub use relay::*;
