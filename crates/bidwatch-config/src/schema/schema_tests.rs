use super::*;

#[test]
fn test_default_timings() {
    let config = Config::default();
    assert_eq!(config.reconciler.coalesce_window(), Duration::from_millis(150));
    assert_eq!(config.reconciler.staleness_window(), Duration::from_secs(45));
    assert_eq!(config.reconciler.health_check_interval(), Duration::from_secs(30));
    assert_eq!(config.reconciler.fallback_poll_interval(), Duration::from_secs(2));
    assert_eq!(config.actions.timeout(), Duration::from_secs(5));
}

#[test]
fn test_default_queues() {
    let config = Config::default();
    assert_eq!(config.hub.connection_queue, 256);
    assert!(config.hub.event_queue > 0);
    assert!(config.hub.command_queue > 0);
    assert_eq!(config.observer.queue_capacity, 1024);
}

#[test]
fn test_backoff_doubles_and_caps() {
    let session = SessionConfig {
        backoff_base_ms: 1000,
        backoff_max_ms: 5000,
        ..Default::default()
    };
    assert_eq!(session.backoff_for(1), Duration::from_millis(1000));
    assert_eq!(session.backoff_for(2), Duration::from_millis(2000));
    assert_eq!(session.backoff_for(3), Duration::from_millis(4000));
    assert_eq!(session.backoff_for(4), Duration::from_millis(5000));
    assert_eq!(session.backoff_for(40), Duration::from_millis(5000));
}

#[test]
fn test_default_selector_tables_not_empty() {
    let selectors = SelectorsConfig::default();
    assert!(!selectors.fields.current_bid.is_empty());
    assert!(!selectors.fields.time_remaining.is_empty());
    assert!(!selectors.elements.bid_button.is_empty());
    assert!(!selectors.elements.plus_button.is_empty());
    assert!(!selectors.elements.bid_input.is_empty());
}

#[test]
fn test_default_session_lists() {
    let session = SessionConfig::default();
    assert_eq!(session.max_attempts, 3);
    assert!(!session.ready_selectors.is_empty());
    assert!(
        session
            .dismiss_selectors
            .iter()
            .any(|s| s.contains("LeaveAuctionConfirmationOk"))
    );
    assert!(
        session
            .block_markers
            .texts
            .iter()
            .any(|t| t.contains("Access Denied"))
    );
}

#[test]
fn test_roundtrip_through_toml() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.server.port, config.server.port);
    assert_eq!(parsed.observer.binding_name, config.observer.binding_name);
}
