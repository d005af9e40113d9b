//! Navigation and extraction errors.

use thiserror::Error;

use super::PageError;

/// Retryable navigation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Navigation to {url} failed: {source}")]
    Load { url: String, source: PageError },

    #[error("No ready selector matched within {timeout_ms} ms")]
    NotReady { timeout_ms: u64 },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<NavigationError> },
}

/// Non-retryable: the page is a bot-protection interstitial.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Page blocked by bot protection (marker: {marker})")]
pub struct BlockedError {
    pub marker: String,
}

/// Local, non-fatal failure of one extraction strategy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unparseable {field}: {value}")]
    Unparseable { field: &'static str, value: String },
}
