use super::*;

#[test]
fn test_action_kind_parsing() {
    let action: ActionKind = serde_json::from_str(r#"{"kind":"highlight_bid_button"}"#).unwrap();
    assert_eq!(action, ActionKind::HighlightBidButton);

    let action: ActionKind =
        serde_json::from_str(r#"{"kind":"prepare_bid","amount":1750.5}"#).unwrap();
    assert_eq!(action, ActionKind::PrepareBid { amount: 1750.5 });

    let action: ActionKind =
        serde_json::from_str(r#"{"kind":"locate","role":"bid_input"}"#).unwrap();
    assert_eq!(
        action,
        ActionKind::Locate {
            role: ElementRole::BidInput
        }
    );
}

#[test]
fn test_action_kind_rejects_unknown() {
    assert!(serde_json::from_str::<ActionKind>(r#"{"kind":"place_bid"}"#).is_err());
    assert!(serde_json::from_str::<ActionKind>(r#"{"kind":"prepare_bid"}"#).is_err());
    assert!(serde_json::from_str::<ActionKind>(r#"{"kind":"locate","role":"submit"}"#).is_err());
}

#[test]
fn test_action_names_and_roles() {
    assert_eq!(ActionKind::ClickPlus.name(), "click_plus");
    assert_eq!(ActionKind::ClickPlus.highlight_role(), Some(ElementRole::PlusButton));
    assert_eq!(
        ActionKind::PrepareBid { amount: 1.0 }.highlight_role(),
        Some(ElementRole::BidButton)
    );
    let locate = ActionKind::Locate {
        role: ElementRole::PlusButton,
    };
    assert_eq!(locate.name(), "locate");
    assert_eq!(locate.highlight_role(), None);
    assert_eq!(ElementRole::BidInput.to_string(), "bid_input");
}
