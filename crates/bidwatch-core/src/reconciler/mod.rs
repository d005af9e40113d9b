//! State reconciler.
//!
//! Consumes raw [`ObservedEvent`]s, extracts fields through an ordered
//! strategy chain and publishes a new sequenced [`AuctionState`] only when an
//! observable field changed.
//!
//! Events are grouped into refresh cycles: a cycle opens with its first
//! event and is flushed once the coalescing window has elapsed. Within a
//! cycle, network values beat DOM values for the same field.

mod parse;
mod strategy;

use std::time::Duration;

use bidwatch_config::ReconcilerConfig;
use bidwatch_protocols::{AuctionFields, AuctionState, EventSource, ObservedEvent};
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use parse::{parse_amount, parse_count};
pub use strategy::{
    DomSnapshotStrategy, ExtractionStrategy, NetworkPayloadStrategy, VisibleTextStrategy,
};

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;

struct RefreshCycle {
    opened_at: Instant,
    network: AuctionFields,
    dom: AuctionFields,
    events: usize,
}

pub struct StateReconciler {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    coalesce_window: Duration,
    staleness_window: Duration,
    lot_hint: Option<String>,
    cycle: Option<RefreshCycle>,
    last: Option<AuctionState>,
    sequence: u64,
    last_success: Instant,
}

impl StateReconciler {
    pub fn new(config: &ReconcilerConfig, strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self {
            strategies,
            coalesce_window: config.coalesce_window(),
            staleness_window: config.staleness_window(),
            lot_hint: None,
            cycle: None,
            last: None,
            sequence: 0,
            last_success: Instant::now(),
        }
    }

    /// Reconciler with the standard chain: network payload, DOM snapshot, visible text.
    pub fn with_default_strategies(config: &ReconcilerConfig) -> Self {
        let mut strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(NetworkPayloadStrategy::new(config.network_fields.clone())),
            Box::new(DomSnapshotStrategy),
        ];
        match VisibleTextStrategy::new() {
            Ok(text) => strategies.push(Box::new(text)),
            Err(e) => warn!(error = %e, "Visible text strategy unavailable"),
        }
        Self::new(config, strategies)
    }

    /// Lot id to assume until the page reports one (e.g. parsed from the URL).
    pub fn with_lot_hint(mut self, lot: Option<String>) -> Self {
        self.lot_hint = lot;
        self
    }

    /// Run the strategy chain over one event.
    ///
    /// The first strategy yielding a complete field set wins; otherwise
    /// partial results are merged in priority order.
    fn extract(&self, event: &ObservedEvent) -> AuctionFields {
        let mut merged = AuctionFields::default();
        for strategy in self.strategies.iter().filter(|s| s.accepts(event.source)) {
            match strategy.extract(&event.payload) {
                Ok(fields) if fields.is_complete() => return fields,
                Ok(fields) => merged.fill_missing(&fields),
                Err(e) => debug!(strategy = strategy.name(), error = %e, "Extraction skipped"),
            }
        }
        merged
    }

    /// Add an event to the current refresh cycle, opening one if needed.
    pub fn observe(&mut self, event: ObservedEvent) {
        let fields = self.extract(&event);
        if fields.is_empty() {
            debug!(source = ?event.source, "Event carried no auction fields");
            return;
        }

        let cycle = self.cycle.get_or_insert_with(|| RefreshCycle {
            opened_at: Instant::now(),
            network: AuctionFields::default(),
            dom: AuctionFields::default(),
            events: 0,
        });
        cycle.events += 1;
        match event.source {
            EventSource::Network => cycle.network.overlay(&fields),
            EventSource::Mutation => cycle.dom.overlay(&fields),
        }
    }

    /// When the open cycle should be flushed.
    pub fn cycle_deadline(&self) -> Option<Instant> {
        self.cycle
            .as_ref()
            .map(|cycle| cycle.opened_at + self.coalesce_window)
    }

    /// Close the current cycle and publish if anything observable changed.
    pub fn flush_cycle(&mut self) -> Option<AuctionState> {
        let cycle = self.cycle.take()?;
        let mut observed = cycle.dom;
        observed.overlay(&cycle.network);

        // Freshness is judged on what this cycle extracted, before the last
        // snapshot is carried forward. The URL lot hint may stand in for the id.
        let mut extracted = observed.clone();
        if extracted.lot_id.is_none() {
            extracted.lot_id.clone_from(&self.lot_hint);
        }
        if extracted.is_complete() {
            self.last_success = Instant::now();
        }

        let lot_changed = match (&observed.lot_id, &self.last) {
            (Some(lot), Some(last)) => *lot != last.lot_id,
            _ => false,
        };

        // A new lot starts from what this cycle saw; otherwise carry the
        // last snapshot forward so partial updates stay publishable.
        let mut candidate = match &self.last {
            Some(last) if !lot_changed => last.fields(),
            _ => AuctionFields {
                lot_id: self.lot_hint.clone(),
                ..Default::default()
            },
        };
        candidate.overlay(&observed);

        if let (Some(last), Some(bid)) = (&self.last, candidate.current_bid) {
            if !lot_changed && bid < last.current_bid {
                debug!(
                    observed = bid,
                    published = last.current_bid,
                    "Ignoring bid below the published floor"
                );
                candidate.current_bid = Some(last.current_bid);
            }
        }

        if !candidate.is_complete() {
            debug!(events = cycle.events, "Refresh cycle produced an incomplete state");
            return None;
        }

        if let Some(last) = &self.last {
            if last.fields() == candidate {
                return None;
            }
        }

        let state = AuctionState::from_fields(&candidate, self.sequence + 1, Utc::now())?;
        self.sequence = state.sequence;
        self.last = Some(state.clone());
        Some(state)
    }

    /// Single-event cycle: observe and flush immediately.
    pub fn reconcile(&mut self, event: ObservedEvent) -> Option<AuctionState> {
        self.observe(event);
        self.flush_cycle()
    }

    pub fn snapshot(&self) -> Option<&AuctionState> {
        self.last.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// No cycle extracted a complete field set for longer than the staleness
    /// window. Partial updates merged onto the last snapshot do not count.
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_success) > self.staleness_window
    }

    /// Restart the staleness clock, e.g. once the page is attached.
    pub fn reset_staleness(&mut self) {
        self.last_success = Instant::now();
    }
}
