//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

/// One problem found in the configuration, keyed by its dotted path.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub path: &'static str,
    pub message: String,
}

/// Errors make the configuration unusable; warnings are logged at startup.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: &'static str, message: impl Into<String>) {
        self.errors.push(ConfigIssue {
            path,
            message: message.into(),
        });
    }

    fn warn(&mut self, path: &'static str, message: impl Into<String>) {
        self.warnings.push(ConfigIssue {
            path,
            message: message.into(),
        });
    }

    /// Fail on the first error, counting any others; otherwise hand back the warnings.
    pub fn into_result(self) -> Result<Vec<ConfigIssue>, ConfigError> {
        let more = self.errors.len().saturating_sub(1);
        match self.errors.into_iter().next() {
            Some(first) if more > 0 => Err(ConfigError::InvalidValue {
                field: first.path.to_string(),
                message: format!("{} (and {more} more)", first.message),
            }),
            Some(first) => Err(ConfigError::InvalidValue {
                field: first.path.to_string(),
                message: first.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> ValidationReport {
        let mut report = ValidationReport::default();

        Self::validate_server(config, &mut report);
        Self::validate_browser(config, &mut report);
        Self::validate_session(config, &mut report);
        Self::validate_observer(config, &mut report);
        Self::validate_reconciler(config, &mut report);
        Self::validate_selectors(config, &mut report);
        Self::validate_hub(config, &mut report);

        report
    }

    fn validate_server(config: &Config, report: &mut ValidationReport) {
        if config.server.port == 0 {
            report.error("server.port", "Port cannot be 0");
        }

        if config.server.host.is_empty() {
            report.error("server.host", "Host cannot be empty");
        }
    }

    fn validate_browser(config: &Config, report: &mut ValidationReport) {
        let endpoint = &config.browser.endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            report.error(
                "browser.endpoint",
                "endpoint must start with http:// or https://",
            );
        }

        if config.browser.request_timeout_secs == 0 {
            report.error(
                "browser.request_timeout_secs",
                "request_timeout_secs must be greater than 0",
            );
        }
    }

    fn validate_session(config: &Config, report: &mut ValidationReport) {
        let session = &config.session;

        if session.max_attempts == 0 {
            report.error(
                "session.max_attempts",
                "max_attempts must be at least 1",
            );
        }

        if session.max_attempts > 10 {
            report.warn(
                "session.max_attempts",
                "max_attempts is very high (>10), a blocked site may be hammered",
            );
        }

        if session.backoff_max_ms < session.backoff_base_ms {
            report.error(
                "session.backoff_max_ms",
                "backoff_max_ms must not be smaller than backoff_base_ms",
            );
        }

        if session.ready_selectors.is_empty() {
            report.error(
                "session.ready_selectors",
                "At least one ready selector is required",
            );
        }

        if session.ready_poll_ms == 0 {
            report.error(
                "session.ready_poll_ms",
                "ready_poll_ms must be greater than 0",
            );
        }

        if let Some(ref base) = session.site_base_url {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                report.error(
                    "session.site_base_url",
                    "site_base_url must start with http:// or https://",
                );
            }
        }

        if session.block_markers.texts.is_empty() && session.block_markers.selectors.is_empty() {
            report.warn(
                "session.block_markers",
                "No block markers configured, interstitials will surface as navigation timeouts",
            );
        }
    }

    fn validate_observer(config: &Config, report: &mut ValidationReport) {
        let observer = &config.observer;

        if observer.root_selectors.is_empty() {
            report.error(
                "observer.root_selectors",
                "At least one root selector is required",
            );
        }

        let valid_binding = !observer.binding_name.is_empty()
            && observer
                .binding_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if !valid_binding {
            report.error(
                "observer.binding_name",
                "binding_name must be a plain JavaScript identifier",
            );
        }

        if observer.queue_capacity == 0 {
            report.error(
                "observer.queue_capacity",
                "queue_capacity must be greater than 0",
            );
        }

        if observer.network_filters.is_empty() {
            report.warn(
                "observer.network_filters",
                "No network filters configured, only DOM mutations will be observed",
            );
        }
    }

    fn validate_reconciler(config: &Config, report: &mut ValidationReport) {
        let reconciler = &config.reconciler;

        if !(100..=200).contains(&reconciler.coalesce_window_ms) {
            report.warn(
                "reconciler.coalesce_window_ms",
                format!(
                    "coalesce_window_ms = {} is outside the usual 100-200 ms range",
                    reconciler.coalesce_window_ms
                ),
            );
        }

        if reconciler.staleness_window_secs == 0 {
            report.error(
                "reconciler.staleness_window_secs",
                "staleness_window_secs must be greater than 0",
            );
        }

        if reconciler.fallback_poll_interval_secs == 0 {
            report.error(
                "reconciler.fallback_poll_interval_secs",
                "fallback_poll_interval_secs must be greater than 0",
            );
        }

        if reconciler.tick_ms == 0 {
            report.error(
                "reconciler.tick_ms",
                "tick_ms must be greater than 0",
            );
        }

        if reconciler.health_check_interval_secs >= reconciler.staleness_window_secs {
            report.warn(
                "reconciler.health_check_interval_secs",
                "health checks run less often than the staleness window, quiet auctions will degrade",
            );
        }
    }

    fn validate_selectors(config: &Config, report: &mut ValidationReport) {
        let elements = &config.selectors.elements;
        let tables = [
            ("selectors.elements.bid_button", &elements.bid_button),
            ("selectors.elements.plus_button", &elements.plus_button),
            ("selectors.elements.bid_input", &elements.bid_input),
        ];
        for (path, table) in tables {
            if table.is_empty() {
                report.warn(
                    path,
                    "Empty selector table, actions for this role will always fail",
                );
            }
            if table.iter().any(|s| s.trim().is_empty()) {
                report.error(path, "Selectors cannot be empty strings");
            }
        }

        if config.selectors.fields.current_bid.is_empty() {
            report.warn(
                "selectors.fields.current_bid",
                "No current bid selectors, DOM extraction relies on visible text only",
            );
        }
    }

    fn validate_hub(config: &Config, report: &mut ValidationReport) {
        let hub = &config.hub;
        // Connected and snapshot frames are queued before the viewer reads anything.
        if hub.connection_queue < 2 {
            report.error(
                "hub.connection_queue",
                "connection_queue must be at least 2",
            );
        }

        if hub.event_queue == 0 || hub.command_queue == 0 {
            report.error(
                "hub",
                "event_queue and command_queue must be greater than 0",
            );
        }
    }
}
