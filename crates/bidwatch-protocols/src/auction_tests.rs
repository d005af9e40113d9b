use super::*;

fn complete_fields() -> AuctionFields {
    AuctionFields {
        lot_id: Some("51234567".to_string()),
        current_bid: Some(1500.0),
        current_bidder: Some("Dallas, TX".to_string()),
        time_remaining: Some("00:45".to_string()),
        status: Some(AuctionStatus::Live),
        bidder_count: Some(4),
    }
}

#[test]
fn test_status_from_text() {
    assert_eq!(AuctionStatus::from_text("Auction is LIVE"), Some(AuctionStatus::Live));
    assert_eq!(AuctionStatus::from_text("running"), Some(AuctionStatus::Live));
    assert_eq!(AuctionStatus::from_text("Ending soon"), Some(AuctionStatus::Ending));
    assert_eq!(AuctionStatus::from_text("Going twice"), Some(AuctionStatus::Ending));
    assert_eq!(AuctionStatus::from_text("Sold!"), Some(AuctionStatus::Closed));
    assert_eq!(AuctionStatus::from_text("Auction ended"), Some(AuctionStatus::Closed));
    assert_eq!(AuctionStatus::from_text("Upcoming"), Some(AuctionStatus::Pending));
    assert_eq!(AuctionStatus::from_text("   "), None);
    assert_eq!(AuctionStatus::from_text("lot 42"), None);
}

#[test]
fn test_status_serialization() {
    let json = serde_json::to_string(&AuctionStatus::Ending).unwrap();
    assert_eq!(json, "\"ending\"");
    assert_eq!(AuctionStatus::Closed.as_str(), "closed");
}

#[test]
fn test_fields_completeness() {
    let mut fields = AuctionFields::default();
    assert!(fields.is_empty());
    assert!(!fields.is_complete());

    fields.current_bid = Some(100.0);
    assert!(!fields.is_empty());
    assert!(!fields.is_complete());

    assert!(complete_fields().is_complete());
}

#[test]
fn test_overlay_prefers_other() {
    let mut base = complete_fields();
    base.overlay(&AuctionFields {
        current_bid: Some(1600.0),
        ..Default::default()
    });
    assert_eq!(base.current_bid, Some(1600.0));
    assert_eq!(base.lot_id.as_deref(), Some("51234567"));
}

#[test]
fn test_fill_missing_keeps_existing() {
    let mut partial = AuctionFields {
        current_bid: Some(1700.0),
        ..Default::default()
    };
    partial.fill_missing(&complete_fields());
    assert_eq!(partial.current_bid, Some(1700.0));
    assert_eq!(partial.status, Some(AuctionStatus::Live));
    assert!(partial.is_complete());
}

#[test]
fn test_state_from_incomplete_fields() {
    let fields = AuctionFields {
        current_bid: Some(1.0),
        ..Default::default()
    };
    assert!(AuctionState::from_fields(&fields, 1, Utc::now()).is_none());
}

#[test]
fn test_diff_only_changed_fields() {
    let first = AuctionState::from_fields(&complete_fields(), 1, Utc::now()).unwrap();
    let mut next_fields = complete_fields();
    next_fields.current_bid = Some(1550.0);
    let second = AuctionState::from_fields(&next_fields, 2, Utc::now()).unwrap();

    let diff = second.diff_from(Some(&first));
    assert_eq!(diff.sequence, 2);
    assert_eq!(diff.changes.current_bid, Some(1550.0));
    assert!(diff.changes.lot_id.is_none());
    assert!(diff.changes.status.is_none());

    let initial = first.diff_from(None);
    assert!(initial.changes.is_complete());
}

#[test]
fn test_state_wire_format() {
    let state = AuctionState::from_fields(&complete_fields(), 3, Utc::now()).unwrap();
    let value = serde_json::to_value(&state).unwrap();
    assert_eq!(value["lotId"], "51234567");
    assert_eq!(value["currentBid"], 1500.0);
    assert_eq!(value["status"], "live");
    assert_eq!(value["bidderCount"], 4);
    assert_eq!(value["currentBidder"], "Dallas, TX");
    assert_eq!(value["sequence"], 3);
}

#[test]
fn test_bidder_change_alone_is_a_diff() {
    let first = AuctionState::from_fields(&complete_fields(), 1, Utc::now()).unwrap();
    let mut next_fields = complete_fields();
    next_fields.current_bidder = Some("Online Bidder".to_string());
    let second = AuctionState::from_fields(&next_fields, 2, Utc::now()).unwrap();

    let diff = second.diff_from(Some(&first));
    assert_eq!(diff.changes.current_bidder.as_deref(), Some("Online Bidder"));
    assert!(diff.changes.current_bid.is_none());
    assert!(!diff.changes.is_empty());
}

#[test]
fn test_diff_omits_unchanged_on_wire() {
    let diff = StateDiff {
        sequence: 7,
        changes: AuctionFields {
            current_bid: Some(150.0),
            ..Default::default()
        },
    };
    let value = serde_json::to_value(&diff).unwrap();
    assert_eq!(value["changes"]["currentBid"], 150.0);
    assert!(value["changes"].get("lotId").is_none());
}
