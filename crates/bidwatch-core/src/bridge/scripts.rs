//! In-page scripts installed by the observer bridge.
//!
//! Every script is a self-invoking function taking one JSON config object, so
//! selectors and names never need JavaScript escaping beyond `serde_json`.

use bidwatch_config::{FieldSelectors, ObserverConfig};
use serde_json::json;

pub const OBSERVER_MARKER: &str = "bidwatch:observer";
pub const SCRAPE_MARKER: &str = "bidwatch:scrape";
pub const NETWORK_HOOK_MARKER: &str = "bidwatch:network-hook";

/// Shared helpers: first-match field lookup and the snapshot builder.
const SNAPSHOT_JS: &str = r#"
  const __bwFirst = (selectors) => {
    for (const s of selectors) {
      let el = null;
      try { el = document.querySelector(s); } catch (e) { continue; }
      if (!el) continue;
      const raw = (typeof el.value === 'string' && el.value.trim()) ? el.value : el.textContent;
      if (raw && raw.trim()) return raw.trim();
    }
    return null;
  };
  const __bwRoot = () => {
    for (const s of cfg.roots) {
      try { const el = document.querySelector(s); if (el) return el; } catch (e) {}
    }
    return null;
  };
  const __bwSnapshot = () => {
    const fields = {};
    for (const [key, selectors] of Object.entries(cfg.fields)) {
      const value = __bwFirst(selectors);
      if (value !== null) fields[key] = value;
    }
    const root = __bwRoot() || document.body;
    const text = root ? (root.innerText || '').slice(0, cfg.maxText) : '';
    return { kind: 'mutation', fields, text };
  };
"#;

const OBSERVER_JS: &str = r#"
  const emit = (payload) => {
    try { window[cfg.binding](JSON.stringify(payload)); } catch (e) {}
  };
  const current = window.__bidwatchObserver;
  if (current && current.root && current.root.isConnected) return 'attached';
  if (current && current.timer) clearTimeout(current.timer);
  const install = () => {
    const root = __bwRoot();
    if (!root) {
      window.__bidwatchObserver = { timer: setTimeout(install, cfg.retryMs) };
      return;
    }
    const observer = new MutationObserver(() => emit(__bwSnapshot()));
    observer.observe(root, {
      childList: true,
      subtree: true,
      characterData: true,
      attributes: true,
      attributeFilter: ['value', 'class'],
    });
    window.__bidwatchObserver = { root, observer };
    emit(__bwSnapshot());
  };
  install();
  return 'installed';
"#;

const NETWORK_HOOK_JS: &str = r#"
  if (window.__bidwatchNetHook) return 'present';
  window.__bidwatchNetHook = true;
  const emit = (payload) => {
    try { window[cfg.binding](JSON.stringify(payload)); } catch (e) {}
  };
  const matches = (url) => {
    const s = String(url || '');
    return cfg.filters.some((f) => s.includes(f));
  };
  const origFetch = window.fetch;
  if (typeof origFetch === 'function') {
    window.fetch = function (...args) {
      return origFetch.apply(this, args).then((resp) => {
        try {
          if (matches(resp.url)) {
            resp.clone().text()
              .then((body) => emit({ kind: 'network', url: resp.url, body }))
              .catch(() => {});
          }
        } catch (e) {}
        return resp;
      });
    };
  }
  const origOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, url, ...rest) {
    this.__bwUrl = url;
    return origOpen.call(this, method, url, ...rest);
  };
  const origSend = XMLHttpRequest.prototype.send;
  XMLHttpRequest.prototype.send = function (...args) {
    this.addEventListener('load', () => {
      try {
        if (matches(this.__bwUrl)) {
          emit({ kind: 'network', url: String(this.__bwUrl), body: String(this.responseText) });
        }
      } catch (e) {}
    });
    return origSend.apply(this, args);
  };
  return 'installed';
"#;

fn script_config(observer: &ObserverConfig, fields: &FieldSelectors) -> String {
    json!({
        "binding": observer.binding_name,
        "roots": observer.root_selectors,
        "filters": observer.network_filters,
        "maxText": observer.max_text_chars,
        "retryMs": observer.root_retry_ms,
        "fields": {
            "lotId": fields.lot_id,
            "currentBid": fields.current_bid,
            "currentBidder": fields.current_bidder,
            "timeRemaining": fields.time_remaining,
            "status": fields.status,
            "bidderCount": fields.bidder_count,
        },
    })
    .to_string()
}

fn wrap(marker: &str, body: &[&str], config: &str) -> String {
    format!("/* {marker} */ (function (cfg) {{{}}})({config})", body.concat())
}

/// MutationObserver on the root element; posts a field snapshot per batch.
pub fn observer(observer: &ObserverConfig, fields: &FieldSelectors) -> String {
    wrap(
        OBSERVER_MARKER,
        &[SNAPSHOT_JS, OBSERVER_JS],
        &script_config(observer, fields),
    )
}

/// One-shot snapshot, evaluated for its return value.
pub fn scrape(observer: &ObserverConfig, fields: &FieldSelectors) -> String {
    wrap(
        SCRAPE_MARKER,
        &[SNAPSHOT_JS, "\n  return __bwSnapshot();\n"],
        &script_config(observer, fields),
    )
}

/// fetch/XHR interception for auction-protocol endpoints.
pub fn network_hook(observer: &ObserverConfig, fields: &FieldSelectors) -> String {
    wrap(
        NETWORK_HOOK_MARKER,
        &[NETWORK_HOOK_JS],
        &script_config(observer, fields),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_carry_markers() {
        let observer_cfg = ObserverConfig::default();
        let fields = FieldSelectors::default();
        assert!(observer(&observer_cfg, &fields).contains(OBSERVER_MARKER));
        assert!(scrape(&observer_cfg, &fields).contains(SCRAPE_MARKER));
        assert!(network_hook(&observer_cfg, &fields).contains(NETWORK_HOOK_MARKER));
    }

    #[test]
    fn test_config_is_embedded_as_json() {
        let observer_cfg = ObserverConfig {
            binding_name: "__emitTest".to_string(),
            root_selectors: vec!["#auction-root".to_string()],
            ..Default::default()
        };
        let script = observer(&observer_cfg, &FieldSelectors::default());
        assert!(script.contains(r#""binding":"__emitTest""#));
        assert!(script.contains("#auction-root"));
        assert!(script.contains("MutationObserver"));
    }

    #[test]
    fn test_selector_quotes_are_escaped() {
        let fields = FieldSelectors {
            current_bid: vec![r#"[data-x="bid"]"#.to_string()],
            ..Default::default()
        };
        let script = scrape(&ObserverConfig::default(), &fields);
        assert!(script.contains(r#"[data-x=\"bid\"]"#));
    }
}
