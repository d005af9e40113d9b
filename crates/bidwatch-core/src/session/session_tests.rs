use std::sync::Arc;
use std::time::Duration;

use bidwatch_config::Config;
use bidwatch_protocols::{
    ActionError, ActionKind, FailureKind, PageAdapter, PageEvent, RelayError, RelayEvent,
    SessionStatus,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::*;
use crate::actions::scripts::REVERT_MARKER;
use crate::bridge::scripts::OBSERVER_MARKER;
use crate::testing::{ScriptedPage, ScriptedSource};

const URL: &str = "https://www.copart.com/lot/5551234";
const BINDING: &str = "__bidwatchEmit";

struct Harness {
    manager: SessionManager,
    source: Arc<ScriptedSource>,
    events: mpsc::Receiver<RelayEvent>,
    _worker: JoinHandle<()>,
}

impl Harness {
    fn new(page: Arc<ScriptedPage>) -> Self {
        let (tx, events) = mpsc::channel(1024);
        let source = ScriptedSource::new(page);
        let (manager, worker) = SessionManager::spawn(Arc::new(Config::default()), source.clone(), tx);
        Self {
            manager,
            source,
            events,
            _worker: worker,
        }
    }

    fn page(&self) -> &Arc<ScriptedPage> {
        self.source.page()
    }

    async fn next_event(&mut self) -> RelayEvent {
        tokio::time::timeout(Duration::from_secs(600), self.events.recv())
            .await
            .expect("relay event in time")
            .expect("event channel open")
    }

    /// Statuses reported until (and including) `target`.
    async fn statuses_until(&mut self, target: SessionStatus) -> Vec<SessionStatus> {
        let mut seen = Vec::new();
        loop {
            if let RelayEvent::StatusChanged { session, .. } = self.next_event().await {
                seen.push(session.status);
                if session.status == target {
                    return seen;
                }
            }
        }
    }

    async fn next_state(&mut self) -> bidwatch_protocols::AuctionState {
        loop {
            if let RelayEvent::StateUpdated { state, .. } = self.next_event().await {
                return state;
            }
        }
    }

    async fn monitoring(&mut self) {
        self.manager.start(URL).await.unwrap();
        self.statuses_until(SessionStatus::Monitoring).await;
        let first = self.next_state().await;
        assert_eq!(first.sequence, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_reaches_monitoring_and_publishes_first_state() {
    let mut h = Harness::new(ScriptedPage::live_auction("5551234", 1500.0));

    let mut handle = h.manager.start(URL).await.unwrap();
    assert_eq!(handle.session().status, SessionStatus::Navigating);
    assert_eq!(handle.session().target_url, URL);

    let statuses = h.statuses_until(SessionStatus::Monitoring).await;
    assert_eq!(
        statuses,
        vec![
            SessionStatus::Navigating,
            SessionStatus::Ready,
            SessionStatus::Monitoring
        ]
    );

    let state = h.next_state().await;
    assert_eq!(state.sequence, 1);
    assert_eq!(state.lot_id, "5551234");
    assert_eq!(state.current_bid, 1500.0);

    let session = handle
        .wait_for_status(SessionStatus::Monitoring, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(session.id, handle.id());
    assert_eq!(session.navigation_attempts, 1);
    assert_eq!(h.page().navigations(), vec![URL.to_string()]);
    assert_eq!(h.page().bindings(), vec![BINDING.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_live_updates_are_sequenced_and_coalesced() {
    let mut h = Harness::new(ScriptedPage::live_auction("5551234", 1500.0));
    h.monitoring().await;

    h.page().emit_binding(
        BINDING,
        json!({"kind": "mutation", "fields": {"currentBid": "$1,600"}, "text": ""}),
    );
    let state = h.next_state().await;
    assert_eq!(state.sequence, 2);
    assert_eq!(state.current_bid, 1600.0);

    // DOM and network in the same cycle: one update, network value wins.
    h.page().emit_binding(
        BINDING,
        json!({"kind": "mutation", "fields": {"currentBid": "$1,700"}, "text": ""}),
    );
    h.page().emit(PageEvent::SocketFrame {
        url: "wss://live.g2auction.com/socket.io/?EIO=3".to_string(),
        payload: r#"42["lotUpdate",{"currentBid":1750,"timeRemaining":"0:09"}]"#.to_string(),
    });
    let state = h.next_state().await;
    assert_eq!(state.sequence, 3);
    assert_eq!(state.current_bid, 1750.0);
    assert_eq!(state.time_remaining.as_deref(), Some("0:09"));

    // An identical observation publishes nothing.
    h.page().emit_binding(
        BINDING,
        json!({"kind": "mutation", "fields": {"currentBid": "$1,750"}, "text": ""}),
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.page().emit_binding(
        BINDING,
        json!({"kind": "mutation", "fields": {"currentBid": "$1,800"}, "text": ""}),
    );
    let state = h.next_state().await;
    assert_eq!(state.sequence, 4);
    assert_eq!(state.current_bid, 1800.0);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected_while_active() {
    let mut h = Harness::new(ScriptedPage::live_auction("1", 10.0));
    h.monitoring().await;

    let err = h.manager.start(URL).await.err().unwrap();
    match err {
        RelayError::Conflict(conflict) => assert_eq!(conflict.status, SessionStatus::Monitoring),
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(h.source.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_rejected_while_navigating() {
    let page = ScriptedPage::live_auction("1", 10.0);
    page.set_navigate_delay(Duration::from_secs(5));
    let h = Harness::new(page);

    h.manager.start(URL).await.unwrap();
    let err = h.manager.start(URL).await.err().unwrap();
    assert!(matches!(err, RelayError::Conflict(_)));

    let err = h
        .manager
        .dispatch(ActionKind::HighlightBidButton)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RelayError::Action(ActionError::PageNotReady {
            status: SessionStatus::Navigating
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_is_rejected() {
    let h = Harness::new(ScriptedPage::new());
    let err = h.manager.start("/lot/1").await.err().unwrap();
    assert!(matches!(err, RelayError::Protocol(_)));
    assert_eq!(h.manager.status().status, SessionStatus::Idle);
    assert_eq!(h.source.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_page_fails_once_with_diagnostic() {
    let page = ScriptedPage::new();
    page.set_title("Access Denied");
    let mut h = Harness::new(page);

    h.manager.start(URL).await.unwrap();
    let statuses = h.statuses_until(SessionStatus::Failed).await;
    assert_eq!(statuses, vec![SessionStatus::Navigating, SessionStatus::Failed]);

    let session = h.manager.status();
    let failure = session.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Blocked);
    assert!(failure.message.contains("Access Denied"));
    assert_eq!(session.navigation_attempts, 1);
    assert_eq!(h.page().navigations().len(), 1);

    let diagnostic = h.manager.diagnostic().unwrap();
    assert_eq!(diagnostic.format, "png");
    assert_eq!(diagnostic.data, "iVBORw0KGgo=");
}

#[tokio::test(start_paused = true)]
async fn test_navigation_exhaustion() {
    let mut h = Harness::new(ScriptedPage::new());

    h.manager.start(URL).await.unwrap();
    h.statuses_until(SessionStatus::Failed).await;

    let session = h.manager.status();
    assert_eq!(session.failure.unwrap().kind, FailureKind::Navigation);
    assert_eq!(session.navigation_attempts, 3);
    assert_eq!(h.page().navigations().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried() {
    let page = ScriptedPage::live_auction("1", 10.0);
    page.push_navigate_result(Err(bidwatch_protocols::PageError::Navigation(
        "net::ERR_CONNECTION_RESET".to_string(),
    )));
    let mut h = Harness::new(page);

    h.manager.start(URL).await.unwrap();
    h.statuses_until(SessionStatus::Monitoring).await;
    assert_eq!(h.manager.status().navigation_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_data_degrades_then_recovers() {
    let mut h = Harness::new(ScriptedPage::live_auction("1", 100.0));
    h.monitoring().await;

    // The page stops yielding a complete field set.
    h.page().set_scrape_fields(json!({}));
    assert_eq!(
        h.statuses_until(SessionStatus::Degraded).await,
        vec![SessionStatus::Degraded]
    );
    match h.next_event().await {
        RelayEvent::Notice { code, .. } => assert_eq!(code, "STALE_DATA"),
        other => panic!("expected a notice, got {other:?}"),
    }

    h.page().set_scrape_fields(json!({"lotId": "1", "currentBid": "$120", "status": "Live"}));
    let state = h.next_state().await;
    assert_eq!(state.sequence, 2);
    assert_eq!(state.current_bid, 120.0);
    assert_eq!(
        h.statuses_until(SessionStatus::Monitoring).await,
        vec![SessionStatus::Monitoring]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_releases_page() {
    let mut h = Harness::new(ScriptedPage::live_auction("1", 10.0));

    let idle = h.manager.stop().await.unwrap();
    assert_eq!(idle.status, SessionStatus::Idle);

    h.monitoring().await;
    let stopped = h.manager.stop().await.unwrap();
    assert_eq!(stopped.status, SessionStatus::Stopped);
    assert!(h.page().is_closed());

    let again = h.manager.stop().await.unwrap();
    assert_eq!(again.status, SessionStatus::Stopped);
    assert_eq!(again.id, stopped.id);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_navigation() {
    let page = ScriptedPage::new();
    let mut h = Harness::new(page);

    h.manager.start(URL).await.unwrap();
    let stopped = h.manager.stop().await.unwrap();
    assert_eq!(stopped.status, SessionStatus::Stopped);
    assert_eq!(
        h.statuses_until(SessionStatus::Stopped).await,
        vec![SessionStatus::Navigating, SessionStatus::Stopped]
    );
    assert!(h.page().is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_failure() {
    let page = ScriptedPage::new();
    page.set_title("Access Denied");
    let mut h = Harness::new(page);

    let first = h.manager.start(URL).await.unwrap();
    h.statuses_until(SessionStatus::Failed).await;

    h.page().set_title("Lot 1");
    h.page().set_element(".auctionrunningdiv-MACRO", "");
    h.page()
        .set_scrape_fields(json!({"lotId": "1", "currentBid": "$5", "status": "Live"}));

    let second = h.manager.start(URL).await.unwrap();
    assert_ne!(second.id(), first.id());
    h.statuses_until(SessionStatus::Monitoring).await;
    assert_eq!(h.source.opens(), 2);
    assert!(h.manager.status().failure.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_page_closed_fails_session() {
    let mut h = Harness::new(ScriptedPage::live_auction("1", 10.0));
    h.monitoring().await;

    h.page().close().await.unwrap();
    h.statuses_until(SessionStatus::Failed).await;
    assert_eq!(
        h.manager.status().failure.unwrap().kind,
        FailureKind::PageClosed
    );
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_requires_attached_page() {
    let h = Harness::new(ScriptedPage::live_auction("1", 10.0));
    let err = h
        .manager
        .dispatch(ActionKind::HighlightPlusButton)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RelayError::Action(ActionError::PageNotReady {
            status: SessionStatus::Idle
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_highlight_is_reverted_by_worker() {
    let mut h = Harness::new(ScriptedPage::live_auction("1", 10.0));
    h.monitoring().await;

    let ack = h
        .manager
        .dispatch(ActionKind::HighlightBidButton)
        .await
        .unwrap();
    assert!(!ack.coalesced);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let ack = h
        .manager
        .dispatch(ActionKind::HighlightBidButton)
        .await
        .unwrap();
    assert!(ack.coalesced);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.page().evaluations_containing(REVERT_MARKER), 1);
}

#[tokio::test(start_paused = true)]
async fn test_prepare_bid_below_current_is_rejected() {
    let mut h = Harness::new(ScriptedPage::live_auction("1", 500.0));
    h.monitoring().await;

    let err = h
        .manager
        .dispatch(ActionKind::PrepareBid { amount: 450.0 })
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Action(ActionError::InvalidParams(_))));
    assert!(h.page().clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_reattaches_observer() {
    let mut h = Harness::new(ScriptedPage::live_auction("1", 10.0));
    h.monitoring().await;
    assert_eq!(h.page().evaluations_containing(OBSERVER_MARKER), 1);

    h.page().emit(PageEvent::Navigated {
        url: "https://www.copart.com/lot/1#refresh".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.page().evaluations_containing(OBSERVER_MARKER), 2);
    assert_eq!(h.manager.status().status, SessionStatus::Monitoring);
}
