//! Page adapter errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Page closed")]
    Closed,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_error_display() {
        assert_eq!(PageError::Closed.to_string(), "Page closed");
        let err = PageError::ElementNotFound(".bid-button".to_string());
        assert!(err.to_string().contains(".bid-button"));
        let err = PageError::Timeout("load".to_string());
        assert!(err.to_string().contains("Timed out"));
    }
}
