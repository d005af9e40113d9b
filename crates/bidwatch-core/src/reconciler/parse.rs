//! Lenient parsing of values scraped from pages and payloads.

use serde_json::Value;

/// First number in `text`, ignoring currency symbols and thousands separators.
///
/// `"$1,250.00 USD"` parses as `1250.0`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    let digits = digits.trim_end_matches('.');
    let amount: f64 = digits.parse().ok()?;
    amount.is_finite().then_some(amount)
}

/// First run of digits in `text`.
pub fn parse_count(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn amount_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

pub fn count_from(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}

pub fn text_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Follow a dot-separated path (`"data.bid.amount"`) into a JSON value.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// Decode a network payload body into JSON.
///
/// Accepts plain JSON and Socket.IO style frames (`42["event",{...}]`), in
/// which case the last object in the frame array is returned.
pub fn decode_body(body: &Value) -> Option<Value> {
    let decoded = match body {
        Value::String(raw) => {
            let trimmed = raw.trim_start_matches(|c: char| c.is_ascii_digit());
            serde_json::from_str::<Value>(trimmed).ok()?
        }
        Value::Null => return None,
        other => other.clone(),
    };

    match decoded {
        Value::Array(items) => items.into_iter().rev().find(Value::is_object),
        Value::Object(_) => Some(decoded),
        _ => None,
    }
}
