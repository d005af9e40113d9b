//! # BidWatch Config
//!
//! Configuration management for the BidWatch relay.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigIssue, ConfigValidator, ValidationReport};
