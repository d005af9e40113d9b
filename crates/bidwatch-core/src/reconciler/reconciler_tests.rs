use std::time::Duration;

use bidwatch_protocols::AuctionStatus;
use serde_json::json;

use super::*;

fn reconciler() -> StateReconciler {
    StateReconciler::with_default_strategies(&ReconcilerConfig::default())
}

fn dom(fields: serde_json::Value) -> ObservedEvent {
    ObservedEvent::mutation(json!({"kind": "mutation", "fields": fields, "text": ""}))
}

fn network(body: serde_json::Value) -> ObservedEvent {
    ObservedEvent::network(json!({"url": "wss://g2auction/socket.io", "body": body.to_string()}))
}

fn baseline(reconciler: &mut StateReconciler) -> AuctionState {
    reconciler
        .reconcile(dom(json!({"lotId": "777", "currentBid": "$50", "status": "Live"})))
        .expect("baseline publishes")
}

#[tokio::test]
async fn test_first_state_has_sequence_one() {
    let mut reconciler = reconciler();
    assert_eq!(reconciler.sequence(), 0);
    assert!(reconciler.snapshot().is_none());

    let state = baseline(&mut reconciler);
    assert_eq!(state.sequence, 1);
    assert_eq!(state.lot_id, "777");
    assert_eq!(state.current_bid, 50.0);
    assert_eq!(state.status, AuctionStatus::Live);
}

#[tokio::test]
async fn test_sequence_strictly_increasing_without_gaps() {
    let mut reconciler = reconciler();
    baseline(&mut reconciler);

    let mut sequences = vec![1];
    for bid in [60, 70, 70, 80, 80, 90] {
        if let Some(state) = reconciler.reconcile(dom(json!({"currentBid": bid}))) {
            sequences.push(state.sequence);
        }
    }
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_identical_event_twice_yields_one_state() {
    let mut reconciler = reconciler();
    let event = dom(json!({"lotId": "1", "currentBid": 10, "status": "live"}));
    assert!(reconciler.reconcile(event.clone()).is_some());
    assert!(reconciler.reconcile(event).is_none());
    assert_eq!(reconciler.sequence(), 1);
}

#[tokio::test]
async fn test_network_beats_dom_within_cycle() {
    let mut reconciler = reconciler();
    baseline(&mut reconciler);

    reconciler.observe(network(json!({"currentBid": 120})));
    reconciler.observe(dom(json!({"currentBid": 100})));
    let state = reconciler.flush_cycle().unwrap();
    assert_eq!(state.current_bid, 120.0);

    reconciler.observe(dom(json!({"currentBid": 200})));
    reconciler.observe(network(json!({"currentBid": 180})));
    let state = reconciler.flush_cycle().unwrap();
    assert_eq!(state.current_bid, 180.0);
}

#[tokio::test]
async fn test_burst_within_window_yields_single_update() {
    let mut reconciler = reconciler();
    baseline(&mut reconciler);

    reconciler.observe(dom(json!({"currentBid": 100})));
    reconciler.observe(dom(json!({"currentBid": 150})));
    let state = reconciler.flush_cycle().unwrap();
    assert_eq!(state.current_bid, 150.0);
    assert_eq!(state.sequence, 2);
    assert!(reconciler.flush_cycle().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cycle_deadline_follows_first_event() {
    let mut reconciler = reconciler();
    assert!(reconciler.cycle_deadline().is_none());

    let opened = Instant::now();
    reconciler.observe(dom(json!({"currentBid": 1})));
    tokio::time::advance(Duration::from_millis(100)).await;
    reconciler.observe(dom(json!({"currentBid": 2})));

    assert_eq!(
        reconciler.cycle_deadline(),
        Some(opened + Duration::from_millis(150))
    );
}

#[tokio::test]
async fn test_empty_events_do_not_open_a_cycle() {
    let mut reconciler = reconciler();
    reconciler.observe(dom(json!({})));
    reconciler.observe(ObservedEvent::network(json!({"body": "<html>"})));
    assert!(reconciler.cycle_deadline().is_none());
}

#[tokio::test]
async fn test_lower_bid_is_ignored_within_lot() {
    let mut reconciler = reconciler();
    baseline(&mut reconciler);
    reconciler.reconcile(dom(json!({"currentBid": 500}))).unwrap();

    assert!(reconciler.reconcile(dom(json!({"currentBid": 450}))).is_none());
    assert_eq!(reconciler.snapshot().unwrap().current_bid, 500.0);

    // Other fields still publish, with the bid held at the floor.
    let state = reconciler
        .reconcile(dom(json!({"currentBid": 400, "timeRemaining": "0:05"})))
        .unwrap();
    assert_eq!(state.current_bid, 500.0);
    assert_eq!(state.time_remaining.as_deref(), Some("0:05"));
}

#[tokio::test]
async fn test_lot_change_resets_floor() {
    let mut reconciler = reconciler();
    baseline(&mut reconciler);
    reconciler.reconcile(dom(json!({"currentBid": 900}))).unwrap();

    let state = reconciler
        .reconcile(dom(json!({"lotId": "778", "currentBid": 25, "status": "Live"})))
        .unwrap();
    assert_eq!(state.lot_id, "778");
    assert_eq!(state.current_bid, 25.0);
}

#[tokio::test]
async fn test_new_lot_needs_its_own_complete_fields() {
    let mut reconciler = reconciler();
    baseline(&mut reconciler);

    // Lot switched but no status seen for it yet: nothing to publish.
    assert!(reconciler.reconcile(dom(json!({"lotId": "900", "currentBid": 5}))).is_none());
    assert_eq!(reconciler.snapshot().unwrap().lot_id, "777");
}

#[tokio::test]
async fn test_incomplete_state_is_not_published() {
    let mut reconciler = reconciler();
    assert!(reconciler.reconcile(dom(json!({"currentBid": 100}))).is_none());
    assert_eq!(reconciler.sequence(), 0);
}

#[tokio::test]
async fn test_lot_hint_completes_state() {
    let mut reconciler = reconciler().with_lot_hint(Some("12345".to_string()));
    let state = reconciler
        .reconcile(dom(json!({"currentBid": 100, "status": "Live"})))
        .unwrap();
    assert_eq!(state.lot_id, "12345");
}

#[tokio::test]
async fn test_partial_strategies_merge_in_priority_order() {
    let mut reconciler = reconciler();
    let event = ObservedEvent::mutation(json!({
        "kind": "mutation",
        "fields": {"currentBid": "$700", "status": "Live"},
        "text": "Lot #5551234 Current bid: $650 3 bidders",
    }));
    let state = reconciler.reconcile(event).unwrap();
    // Neither result is complete alone: DOM outranks text for the bid, text
    // fills the gaps.
    assert_eq!(state.current_bid, 700.0);
    assert_eq!(state.lot_id, "5551234");
    assert_eq!(state.status, AuctionStatus::Live);
    assert_eq!(state.bidder_count, Some(3));
}

#[tokio::test]
async fn test_first_complete_strategy_wins() {
    let mut reconciler = reconciler();
    let event = ObservedEvent::mutation(json!({
        "kind": "mutation",
        "fields": {"lotId": "1", "currentBid": 10, "status": "live"},
        "text": "Lot #999999 Current bid: $5 Status: closed 9 bidders",
    }));
    let state = reconciler.reconcile(event).unwrap();
    assert_eq!(state.lot_id, "1");
    assert_eq!(state.bidder_count, None);
}

#[tokio::test(start_paused = true)]
async fn test_staleness_window() {
    let mut reconciler = reconciler();
    assert!(!reconciler.is_stale(Instant::now()));

    tokio::time::advance(Duration::from_secs(46)).await;
    assert!(reconciler.is_stale(Instant::now()));

    baseline(&mut reconciler);
    assert!(!reconciler.is_stale(Instant::now()));

    // An unchanged but complete extraction still counts as healthy.
    tokio::time::advance(Duration::from_secs(40)).await;
    assert!(reconciler
        .reconcile(dom(json!({"lotId": "777", "currentBid": "$50", "status": "Live"})))
        .is_none());
    tokio::time::advance(Duration::from_secs(40)).await;
    assert!(!reconciler.is_stale(Instant::now()));
}

#[tokio::test(start_paused = true)]
async fn test_partial_updates_do_not_keep_data_fresh() {
    let mut reconciler = reconciler();
    baseline(&mut reconciler);

    // Only the countdown still parses; bid, lot and status went missing.
    let mut published = 0;
    for tick in 0..20 {
        tokio::time::advance(Duration::from_secs(10)).await;
        let remaining = format!("0:{:02}", 59 - tick);
        if reconciler
            .reconcile(dom(json!({"timeRemaining": remaining})))
            .is_some()
        {
            published += 1;
        }
    }

    // Countdown changes are still relayed, but the data is flagged stale.
    assert_eq!(published, 20);
    assert!(reconciler.is_stale(Instant::now()));
}

#[tokio::test(start_paused = true)]
async fn test_lot_hint_counts_toward_fresh_extraction() {
    let mut reconciler = reconciler().with_lot_hint(Some("777".to_string()));
    tokio::time::advance(Duration::from_secs(40)).await;
    reconciler.reconcile(dom(json!({"currentBid": 50, "status": "Live"})));
    tokio::time::advance(Duration::from_secs(40)).await;
    assert!(!reconciler.is_stale(Instant::now()));
}
