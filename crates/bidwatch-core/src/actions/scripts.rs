//! Action scripts. None of them click anything.

use serde_json::json;

pub const HIGHLIGHT_MARKER: &str = "bidwatch:highlight";
pub const REVERT_MARKER: &str = "bidwatch:revert";
pub const FILL_MARKER: &str = "bidwatch:fill";

/// Style a highlight applies; colors come from configuration.
pub struct Highlight<'a> {
    pub background: &'a str,
    pub border: &'a str,
    pub color: &'a str,
}

const HIGHLIGHT_JS: &str = r#"
  const el = document.querySelector(cfg.selector);
  if (!el) return false;
  if (!el.dataset.bidwatchOriginal) {
    el.dataset.bidwatchOriginal = JSON.stringify({
      background: el.style.backgroundColor,
      border: el.style.border,
      color: el.style.color,
      boxShadow: el.style.boxShadow,
    });
  }
  el.style.setProperty('background-color', cfg.background, 'important');
  el.style.setProperty('border', '3px solid ' + cfg.border, 'important');
  el.style.setProperty('color', cfg.color, 'important');
  el.style.setProperty('box-shadow', '0 0 12px ' + cfg.border, 'important');
  el.scrollIntoView({ block: 'center', inline: 'center' });
  return true;
"#;

const REVERT_JS: &str = r#"
  const el = document.querySelector(cfg.selector);
  if (!el || !el.dataset.bidwatchOriginal) return false;
  const original = JSON.parse(el.dataset.bidwatchOriginal);
  el.style.setProperty('background-color', original.background);
  el.style.setProperty('border', original.border);
  el.style.setProperty('color', original.color);
  el.style.setProperty('box-shadow', original.boxShadow);
  delete el.dataset.bidwatchOriginal;
  return true;
"#;

const FILL_INPUT_JS: &str = r#"
  const el = document.querySelector(cfg.selector);
  if (!el) return false;
  const proto = Object.getPrototypeOf(el);
  const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
  if (descriptor && descriptor.set) {
    descriptor.set.call(el, cfg.value);
  } else {
    el.value = cfg.value;
  }
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return true;
"#;

fn wrap(marker: &str, body: &str, config: serde_json::Value) -> String {
    format!("/* {marker} */ (function (cfg) {{{body}}})({config})")
}

pub fn highlight(selector: &str, style: &Highlight<'_>) -> String {
    wrap(
        HIGHLIGHT_MARKER,
        HIGHLIGHT_JS,
        json!({
            "selector": selector,
            "background": style.background,
            "border": style.border,
            "color": style.color,
        }),
    )
}

pub fn revert(selector: &str) -> String {
    wrap(REVERT_MARKER, REVERT_JS, json!({ "selector": selector }))
}

/// Stage a bid amount in an input without submitting anything.
pub fn fill_input(selector: &str, amount: f64) -> String {
    wrap(
        FILL_MARKER,
        FILL_INPUT_JS,
        json!({ "selector": selector, "value": format_amount(amount) }),
    )
}

/// Whole amounts without a fractional part, otherwise two decimals.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1500.0), "1500");
        assert_eq!(format_amount(1500.5), "1500.50");
    }

    #[test]
    fn test_fill_input_never_clicks_or_submits() {
        let script = fill_input("input[name='bidAmount']", 1750.0);
        assert!(script.contains("\"1750\""));
        assert!(!script.contains("click"));
        assert!(!script.contains("submit"));
    }

    #[test]
    fn test_highlight_embeds_style() {
        let script = highlight(
            ".bid-button",
            &Highlight {
                background: "#0066ff",
                border: "#003399",
                color: "#ffffff",
            },
        );
        assert!(script.contains(".bid-button"));
        assert!(script.contains("#0066ff"));
        assert!(script.contains("bidwatchOriginal"));
        assert!(!script.contains(".click("));
    }

    #[test]
    fn test_revert_restores_saved_style() {
        let script = revert("#plus");
        assert!(script.contains("#plus"));
        assert!(script.contains("JSON.parse"));
    }
}
