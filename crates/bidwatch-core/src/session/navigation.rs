//! Navigation with readiness polling, block detection and bounded retry.

use bidwatch_config::{BlockMarkers, SessionConfig};
use bidwatch_protocols::{BlockedError, NavigationError, PageAdapter, PageError, ProtocolError};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::selectors::first_present;

/// Returns `{title, text}` of the current document.
pub const PAGE_TEXT_SCRIPT: &str = "(() => ({ title: document.title || '', text: ((document.body && document.body.innerText) || '').slice(0, 20000) }))()";

/// Outcome of a successful [`navigate_until_ready`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyPage {
    pub attempts: u32,
    /// Ready selector that matched.
    pub selector: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationFailure {
    /// Bot protection detected. Never retried.
    #[error("{error} (attempt {attempts})")]
    Blocked { attempts: u32, error: BlockedError },

    #[error(transparent)]
    Exhausted(NavigationError),

    #[error("Page closed during navigation (attempt {attempts})")]
    PageClosed { attempts: u32 },
}

enum AttemptError {
    Blocked(BlockedError),
    Closed,
    Failed(NavigationError),
}

/// Validate a requested target and make it absolute.
///
/// Relative URLs need `base`; only http(s) targets are accepted.
pub fn resolve_target_url(raw: &str, base: Option<&str>) -> Result<String, ProtocolError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ProtocolError::InvalidField {
            field: "url",
            message: "must not be empty".to_string(),
        });
    }

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| ProtocolError::InvalidField {
                field: "url",
                message: "relative URL given but no site base URL is configured".to_string(),
            })?;
            Url::parse(base)
                .and_then(|base| base.join(raw))
                .map_err(|e| ProtocolError::InvalidField {
                    field: "url",
                    message: e.to_string(),
                })?
        }
        Err(e) => {
            return Err(ProtocolError::InvalidField {
                field: "url",
                message: e.to_string(),
            });
        }
    };

    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(ProtocolError::InvalidField {
            field: "url",
            message: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Lot number encoded in an auction URL, if any.
pub fn lot_hint(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;

    let from_query = url.query_pairs().find_map(|(key, value)| {
        matches!(&*key, "lotId" | "lot" | "lotNumber")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    });
    if from_query.is_some() {
        return from_query;
    }

    let segments: Vec<&str> = url.path_segments()?.collect();
    segments
        .windows(2)
        .find(|pair| pair[0].eq_ignore_ascii_case("lot") && is_lot_number(pair[1]))
        .map(|pair| pair[1].to_string())
}

fn is_lot_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Look for bot-protection signatures on the current document.
pub async fn detect_block(
    page: &dyn PageAdapter,
    markers: &BlockMarkers,
) -> Result<Option<BlockedError>, PageError> {
    let page_text = page.evaluate(PAGE_TEXT_SCRIPT).await?;
    let haystack = [page_text.get("title"), page_text.get("text")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    if let Some(marker) = markers
        .texts
        .iter()
        .find(|m| !m.is_empty() && haystack.contains(&m.to_lowercase()))
    {
        return Ok(Some(BlockedError {
            marker: marker.clone(),
        }));
    }

    Ok(first_present(page, &markers.selectors)
        .await?
        .map(|marker| BlockedError { marker }))
}

/// Click away known interstitials. Best-effort; returns how many were dismissed.
pub async fn dismiss_interstitials(page: &dyn PageAdapter, selectors: &[String]) -> usize {
    let mut dismissed = 0;
    for selector in selectors {
        if !matches!(page.element_exists(selector).await, Ok(true)) {
            continue;
        }
        match page.click(selector).await {
            Ok(()) => {
                info!(selector = %selector, "Dismissed interstitial");
                dismissed += 1;
            }
            Err(e) => debug!(selector = %selector, error = %e, "Interstitial click failed"),
        }
    }
    dismissed
}

/// Navigate to `url` and wait until a ready selector appears.
///
/// Failed attempts are retried with exponential backoff up to
/// `max_attempts`. A detected block aborts immediately.
pub async fn navigate_until_ready(
    page: &dyn PageAdapter,
    config: &SessionConfig,
    url: &str,
) -> Result<ReadyPage, NavigationFailure> {
    let max_attempts = config.max_attempts.max(1);
    let mut last = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = config.backoff_for(attempt - 1);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
            tokio::time::sleep(delay).await;
        }

        info!(url = %url, attempt, max_attempts, "Navigating");
        match attempt_once(page, config, url).await {
            Ok(selector) => {
                info!(url = %url, attempt, selector = %selector, "Page ready");
                return Ok(ReadyPage {
                    attempts: attempt,
                    selector,
                });
            }
            Err(AttemptError::Blocked(error)) => {
                warn!(url = %url, marker = %error.marker, "Navigation blocked");
                return Err(NavigationFailure::Blocked {
                    attempts: attempt,
                    error,
                });
            }
            Err(AttemptError::Closed) => {
                return Err(NavigationFailure::PageClosed { attempts: attempt });
            }
            Err(AttemptError::Failed(error)) => {
                warn!(url = %url, attempt, error = %error, "Navigation attempt failed");
                last = Some(error);
            }
        }
    }

    let last = last.unwrap_or(NavigationError::NotReady {
        timeout_ms: config.ready_timeout().as_millis() as u64,
    });
    Err(NavigationFailure::Exhausted(NavigationError::Exhausted {
        attempts: max_attempts,
        last: Box::new(last),
    }))
}

async fn attempt_once(
    page: &dyn PageAdapter,
    config: &SessionConfig,
    url: &str,
) -> Result<String, AttemptError> {
    match tokio::time::timeout(config.navigation_timeout(), page.navigate(url)).await {
        Ok(Ok(())) => {}
        Ok(Err(PageError::Closed)) => return Err(AttemptError::Closed),
        Ok(Err(source)) => {
            return Err(AttemptError::Failed(NavigationError::Load {
                url: url.to_string(),
                source,
            }));
        }
        Err(_) => {
            return Err(AttemptError::Failed(NavigationError::Load {
                url: url.to_string(),
                source: PageError::Timeout(format!(
                    "navigation exceeded {}s",
                    config.navigation_timeout_secs
                )),
            }));
        }
    }

    check_block(page, &config.block_markers).await?;

    let deadline = Instant::now() + config.ready_timeout();
    loop {
        match first_present(page, &config.ready_selectors).await {
            Ok(Some(selector)) => return Ok(selector),
            Ok(None) => {}
            Err(PageError::Closed) => return Err(AttemptError::Closed),
            Err(e) => debug!(error = %e, "Ready check failed"),
        }
        if Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(config.ready_poll()).await;
    }

    // A challenge page may only render after the initial load.
    check_block(page, &config.block_markers).await?;

    Err(AttemptError::Failed(NavigationError::NotReady {
        timeout_ms: config.ready_timeout().as_millis() as u64,
    }))
}

async fn check_block(page: &dyn PageAdapter, markers: &BlockMarkers) -> Result<(), AttemptError> {
    match detect_block(page, markers).await {
        Ok(None) => Ok(()),
        Ok(Some(blocked)) => Err(AttemptError::Blocked(blocked)),
        Err(PageError::Closed) => Err(AttemptError::Closed),
        Err(e) => {
            debug!(error = %e, "Block check failed");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::ScriptedPage;

    const AUCTION: &str = "https://www.copart.com/auctionDashboard?auctionDetails=1-A";

    #[test]
    fn test_resolve_absolute_url() {
        assert_eq!(resolve_target_url(AUCTION, None).unwrap(), AUCTION);
    }

    #[test]
    fn test_resolve_relative_url_against_base() {
        let url = resolve_target_url("/lot/5551234", Some("https://www.copart.com")).unwrap();
        assert_eq!(url, "https://www.copart.com/lot/5551234");
    }

    #[test]
    fn test_resolve_rejects_bad_targets() {
        for raw in ["", "   ", "/lot/1", "ftp://example.com/x", "http://"] {
            let err = resolve_target_url(raw, None).unwrap_err();
            assert!(
                matches!(err, ProtocolError::InvalidField { field: "url", .. }),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn test_lot_hint() {
        assert_eq!(
            lot_hint("https://www.copart.com/lot/5551234/clean-title").as_deref(),
            Some("5551234")
        );
        assert_eq!(
            lot_hint("https://example.com/auction?lotId=42&x=1").as_deref(),
            Some("42")
        );
        assert_eq!(lot_hint(AUCTION), None);
        assert_eq!(lot_hint("not a url"), None);
    }

    #[tokio::test]
    async fn test_detect_block_by_text_case_insensitive() {
        let page = ScriptedPage::new();
        page.set_title("ACCESS DENIED");
        let blocked = detect_block(&*page, &BlockMarkers::default()).await.unwrap();
        assert_eq!(blocked.unwrap().marker, "Access Denied");
    }

    #[tokio::test]
    async fn test_detect_block_by_selector() {
        let page = ScriptedPage::new();
        page.set_element("iframe[src*='hcaptcha']", "");
        let blocked = detect_block(&*page, &BlockMarkers::default()).await.unwrap();
        assert_eq!(blocked.unwrap().marker, "iframe[src*='hcaptcha']");

        let clean = ScriptedPage::live_auction("1", 1.0);
        assert!(detect_block(&*clean, &BlockMarkers::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dismiss_interstitials() {
        let page = ScriptedPage::new();
        page.set_element("#LeaveAuctionConfirmationOk", "OK");
        let dismissed = dismiss_interstitials(&*page, &SessionConfig::default().dismiss_selectors).await;
        assert_eq!(dismissed, 1);
        assert_eq!(page.clicks(), vec!["#LeaveAuctionConfirmationOk".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_attempt() {
        let page = ScriptedPage::live_auction("1", 1.0);
        let ready = navigate_until_ready(&*page, &SessionConfig::default(), AUCTION)
            .await
            .unwrap();
        assert_eq!(ready.attempts, 1);
        assert_eq!(ready.selector, ".auctionrunningdiv-MACRO");
        assert_eq!(page.navigations(), vec![AUCTION.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_is_not_retried() {
        let page = ScriptedPage::new();
        page.set_body_text("Request unsuccessful. Incapsula incident ID: 123");

        let failure = navigate_until_ready(&*page, &SessionConfig::default(), AUCTION)
            .await
            .unwrap_err();
        assert!(matches!(failure, NavigationFailure::Blocked { attempts: 1, .. }));
        assert_eq!(page.navigations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_succeeds() {
        let page = ScriptedPage::live_auction("1", 1.0);
        page.push_navigate_result(Err(PageError::Navigation("net::ERR_FAILED".to_string())));

        let started = Instant::now();
        let ready = navigate_until_ready(&*page, &SessionConfig::default(), AUCTION)
            .await
            .unwrap();
        assert_eq!(ready.attempts, 2);
        assert_eq!(page.navigations().len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_when_never_ready() {
        let page = ScriptedPage::new();
        let failure = navigate_until_ready(&*page, &SessionConfig::default(), AUCTION)
            .await
            .unwrap_err();

        match failure {
            NavigationFailure::Exhausted(NavigationError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, NavigationError::NotReady { timeout_ms: 20_000 });
            }
            other => panic!("unexpected failure: {other:?}"),
        }
        assert_eq!(page.navigations().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_timeout_counts_as_failed_attempt() {
        let page = ScriptedPage::live_auction("1", 1.0);
        page.set_navigate_delay(Duration::from_secs(120));
        let config = SessionConfig {
            max_attempts: 1,
            ..Default::default()
        };

        let failure = navigate_until_ready(&*page, &config, AUCTION).await.unwrap_err();
        match failure {
            NavigationFailure::Exhausted(NavigationError::Exhausted { last, .. }) => {
                assert!(matches!(
                    *last,
                    NavigationError::Load {
                        source: PageError::Timeout(_),
                        ..
                    }
                ));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_page_aborts() {
        let page = ScriptedPage::new();
        page.close().await.unwrap();
        let failure = navigate_until_ready(&*page, &SessionConfig::default(), AUCTION)
            .await
            .unwrap_err();
        assert_eq!(failure, NavigationFailure::PageClosed { attempts: 1 });
    }
}
