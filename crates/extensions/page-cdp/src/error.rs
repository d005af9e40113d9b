//! CDP error types.

use bidwatch_protocols::PageError;
use thiserror::Error;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to connect to Chrome.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Chrome not found or not running with remote debugging.
    #[error("Chrome not available at {0}. Start Chrome with: chrome --remote-debugging-port=9222")]
    ChromeNotAvailable(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Error object returned for a command.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error (for endpoint discovery).
    #[error("HTTP error: {0}")]
    Http(String),

    /// No open tab matched `attach_url_contains`.
    #[error("No open tab matching '{0}'")]
    NoMatchingTab(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}

impl From<CdpError> for PageError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::SessionClosed => PageError::Closed,
            CdpError::NavigationFailed(msg) => PageError::Navigation(msg),
            CdpError::ElementNotFound(selector) => PageError::ElementNotFound(selector),
            CdpError::JavaScript(msg) => PageError::Script(msg),
            CdpError::Timeout(msg) => PageError::Timeout(msg),
            other => PageError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_error_mapping() {
        assert_eq!(PageError::from(CdpError::SessionClosed), PageError::Closed);
        assert_eq!(
            PageError::from(CdpError::ElementNotFound("#bid".to_string())),
            PageError::ElementNotFound("#bid".to_string())
        );
        assert_eq!(
            PageError::from(CdpError::NavigationFailed("net::ERR_ABORTED".to_string())),
            PageError::Navigation("net::ERR_ABORTED".to_string())
        );
        assert!(matches!(
            PageError::from(CdpError::Protocol {
                code: -32000,
                message: "No target".to_string()
            }),
            PageError::Transport(msg) if msg.contains("No target")
        ));
    }

    #[test]
    fn test_missing_tab_is_not_a_closed_page() {
        match PageError::from(CdpError::NoMatchingTab("copart.com".to_string())) {
            PageError::Transport(msg) => assert!(msg.contains("copart.com")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_url_parse_error_is_connection_failure() {
        let err: CdpError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, CdpError::ConnectionFailed(_)));
    }
}
