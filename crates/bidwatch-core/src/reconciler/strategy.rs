//! Field extraction strategies, tried in priority order.

use bidwatch_config::NetworkFieldPaths;
use bidwatch_protocols::{AuctionFields, AuctionStatus, EventSource, ExtractionError};
use regex::Regex;
use serde_json::Value;

use super::parse::{amount_from, count_from, decode_body, lookup, parse_amount, parse_count, text_from};

/// Turns one raw payload into a (possibly partial) field set.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy understands payloads from `source`.
    fn accepts(&self, source: EventSource) -> bool;

    fn extract(&self, payload: &Value) -> Result<AuctionFields, ExtractionError>;
}

/// Configured JSON field paths over intercepted network payloads.
pub struct NetworkPayloadStrategy {
    paths: NetworkFieldPaths,
}

impl NetworkPayloadStrategy {
    pub fn new(paths: NetworkFieldPaths) -> Self {
        Self { paths }
    }

    fn first<'a>(body: &'a Value, paths: &[String]) -> Option<&'a Value> {
        paths.iter().find_map(|path| lookup(body, path))
    }
}

impl ExtractionStrategy for NetworkPayloadStrategy {
    fn name(&self) -> &'static str {
        "network-payload"
    }

    fn accepts(&self, source: EventSource) -> bool {
        source == EventSource::Network
    }

    fn extract(&self, payload: &Value) -> Result<AuctionFields, ExtractionError> {
        let body = payload.get("body").unwrap_or(payload);
        let body = decode_body(body)
            .ok_or_else(|| ExtractionError::MalformedPayload("no JSON object in body".to_string()))?;

        Ok(AuctionFields {
            lot_id: Self::first(&body, &self.paths.lot_id).and_then(text_from),
            current_bid: Self::first(&body, &self.paths.current_bid).and_then(amount_from),
            current_bidder: Self::first(&body, &self.paths.current_bidder).and_then(text_from),
            time_remaining: Self::first(&body, &self.paths.time_remaining).and_then(text_from),
            status: Self::first(&body, &self.paths.status)
                .and_then(text_from)
                .and_then(|s| AuctionStatus::from_text(&s)),
            bidder_count: Self::first(&body, &self.paths.bidder_count).and_then(count_from),
        })
    }
}

/// Field snapshot posted by the in-page watcher (first matching selector per field).
pub struct DomSnapshotStrategy;

impl DomSnapshotStrategy {
    fn field<'a>(fields: &'a Value, camel: &str, snake: &str) -> Option<&'a Value> {
        fields.get(camel).or_else(|| fields.get(snake))
    }
}

impl ExtractionStrategy for DomSnapshotStrategy {
    fn name(&self) -> &'static str {
        "dom-snapshot"
    }

    fn accepts(&self, source: EventSource) -> bool {
        source == EventSource::Mutation
    }

    fn extract(&self, payload: &Value) -> Result<AuctionFields, ExtractionError> {
        let fields = match payload.get("fields") {
            Some(fields) => fields,
            None if payload.is_object() => payload,
            None => {
                return Err(ExtractionError::MalformedPayload(
                    "mutation payload is not an object".to_string(),
                ));
            }
        };
        if !fields.is_object() {
            return Err(ExtractionError::MalformedPayload(
                "fields is not an object".to_string(),
            ));
        }

        Ok(AuctionFields {
            lot_id: Self::field(fields, "lotId", "lot_id").and_then(text_from),
            current_bid: Self::field(fields, "currentBid", "current_bid").and_then(amount_from),
            current_bidder: Self::field(fields, "currentBidder", "current_bidder")
                .and_then(text_from),
            time_remaining: Self::field(fields, "timeRemaining", "time_remaining")
                .and_then(text_from),
            status: Self::field(fields, "status", "status")
                .and_then(text_from)
                .and_then(|s| AuctionStatus::from_text(&s)),
            bidder_count: Self::field(fields, "bidderCount", "bidder_count").and_then(count_from),
        })
    }
}

/// Regular expressions over the visible text of the watched root.
pub struct VisibleTextStrategy {
    bid: Regex,
    bidder: Regex,
    lot: Regex,
    time: Regex,
    bidders: Regex,
    status: Regex,
}

impl VisibleTextStrategy {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bid: Regex::new(
                r"(?i)(?:current|high(?:est)?)\s+bid\s*[:\-]?\s*(?:US)?\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)",
            )?,
            bidder: Regex::new(
                r"(?i)(?:high|current|winning)\s+bidder\s*[:\-]\s*([^\n$]*[^\s$])",
            )?,
            lot: Regex::new(r"(?i)\blot\s*(?:#|no\.?|number)?\s*:?\s*([0-9][0-9\-]{2,})")?,
            time: Regex::new(
                r"(?i)(?:time\s+(?:left|remaining)|ends\s+in)\s*[:\-]?\s*([0-9][0-9:dhms ]*[0-9dhms])",
            )?,
            bidders: Regex::new(r"(?i)([0-9]+)\s+(?:active\s+)?bidders?")?,
            status: Regex::new(r"(?i)\b(?:auction\s+)?status\s*[:\-]\s*([a-z][a-z ]*)")?,
        })
    }

    fn capture(re: &Regex, text: &str) -> Option<String> {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }
}

impl ExtractionStrategy for VisibleTextStrategy {
    fn name(&self) -> &'static str {
        "visible-text"
    }

    fn accepts(&self, source: EventSource) -> bool {
        source == EventSource::Mutation
    }

    fn extract(&self, payload: &Value) -> Result<AuctionFields, ExtractionError> {
        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ExtractionError::MalformedPayload("no visible text".to_string()))?;

        Ok(AuctionFields {
            lot_id: Self::capture(&self.lot, text),
            current_bid: Self::capture(&self.bid, text).and_then(|s| parse_amount(&s)),
            current_bidder: Self::capture(&self.bidder, text),
            time_remaining: Self::capture(&self.time, text),
            status: Self::capture(&self.status, text).and_then(|s| AuctionStatus::from_text(&s)),
            bidder_count: Self::capture(&self.bidders, text).and_then(|s| parse_count(&s)),
        })
    }
}
