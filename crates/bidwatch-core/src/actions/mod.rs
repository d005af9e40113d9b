//! Action relay.
//!
//! Turns viewer actions into page scripts. Highlights are tracked as
//! [`PendingAction`]s with a revert deadline; at most one per element role.
//! A repeated request for a role that is already pending only pushes its
//! deadline back, so each highlight is reverted exactly once.

pub mod scripts;

use std::collections::HashMap;
use std::time::Duration;

use bidwatch_config::{ActionsConfig, ElementSelectors, HighlightStyle};
use bidwatch_protocols::{ActionAck, ActionError, ActionKind, ElementRole, PageAdapter, PageError};
use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::selectors::SelectorTable;
use scripts::Highlight;

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;

/// How long a highlight stays before it is reverted.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub role: ElementRole,
    pub selector: String,
    pub requested_at: Instant,
    pub expires_at: Instant,
}

pub struct ActionRelay {
    selectors: SelectorTable,
    style: HighlightStyle,
    timeout: Duration,
    pending: HashMap<ElementRole, PendingAction>,
}

impl ActionRelay {
    pub fn new(config: &ActionsConfig, elements: ElementSelectors) -> Self {
        Self {
            selectors: SelectorTable::new(elements),
            style: config.highlight.clone(),
            timeout: config.timeout(),
            pending: HashMap::new(),
        }
    }

    /// Run one action against the page, bounded by the action timeout.
    ///
    /// `current_bid` is the latest published bid, used to reject
    /// `prepare_bid` amounts below it.
    pub async fn dispatch(
        &mut self,
        page: &dyn PageAdapter,
        action: &ActionKind,
        current_bid: Option<f64>,
    ) -> Result<ActionAck, ActionError> {
        if let ActionKind::PrepareBid { amount } = action {
            validate_amount(*amount, current_bid)?;
        }

        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.execute(page, action)).await {
            Ok(result) => result,
            Err(_) => Err(ActionError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn execute(
        &mut self,
        page: &dyn PageAdapter,
        action: &ActionKind,
    ) -> Result<ActionAck, ActionError> {
        let kind = action.name();
        match action {
            ActionKind::HighlightBidButton => self.highlight(page, kind, ElementRole::BidButton).await,
            ActionKind::HighlightPlusButton => {
                self.highlight(page, kind, ElementRole::PlusButton).await
            }
            ActionKind::ClickPlus => {
                let selector = self.resolve(page, ElementRole::PlusButton).await?;
                page.click(&selector).await.map_err(|e| match e {
                    PageError::ElementNotFound(_) => ActionError::TargetNotFound {
                        role: ElementRole::PlusButton,
                    },
                    other => ActionError::Script(other.to_string()),
                })?;
                info!(selector = %selector, "Clicked plus button");
                self.highlight(page, kind, ElementRole::PlusButton).await
            }
            ActionKind::PrepareBid { amount } => {
                // Resolve both targets before touching the page.
                let input = self.resolve(page, ElementRole::BidInput).await?;
                self.resolve(page, ElementRole::BidButton).await?;

                let filled = run_script(page, &scripts::fill_input(&input, *amount)).await?;
                if filled != Value::Bool(true) {
                    return Err(ActionError::TargetNotFound {
                        role: ElementRole::BidInput,
                    });
                }
                info!(amount, selector = %input, "Staged bid amount");
                self.highlight(page, kind, ElementRole::BidButton).await
            }
            ActionKind::Locate { role } => {
                let selector = self.resolve(page, *role).await?;
                debug!(role = %role, selector = %selector, "Located element");
                Ok(ActionAck {
                    kind: kind.to_string(),
                    role: *role,
                    selector,
                    coalesced: false,
                    revert_at: None,
                })
            }
        }
    }

    async fn resolve(&self, page: &dyn PageAdapter, role: ElementRole) -> Result<String, ActionError> {
        self.selectors
            .resolve(page, role)
            .await
            .map_err(|e| ActionError::Script(e.to_string()))?
            .ok_or(ActionError::TargetNotFound { role })
    }

    async fn highlight(
        &mut self,
        page: &dyn PageAdapter,
        kind: &str,
        role: ElementRole,
    ) -> Result<ActionAck, ActionError> {
        let now = Instant::now();
        let expires_at = now + HIGHLIGHT_DURATION;

        if let Some(pending) = self.pending.get_mut(&role) {
            pending.expires_at = expires_at;
            debug!(role = %role, "Highlight already pending, deadline extended");
            return Ok(ack(kind, role, &pending.selector, true));
        }

        let selector = self.resolve(page, role).await?;
        let style = match role {
            ElementRole::PlusButton => Highlight {
                background: &self.style.plus_background,
                border: &self.style.plus_border,
                color: &self.style.text_color,
            },
            ElementRole::BidButton | ElementRole::BidInput => Highlight {
                background: &self.style.bid_background,
                border: &self.style.bid_border,
                color: &self.style.text_color,
            },
        };
        let script = scripts::highlight(&selector, &style);

        // Tracked before the script runs so a timeout mid-evaluation still
        // leaves a revert scheduled.
        self.pending.insert(
            role,
            PendingAction {
                role,
                selector: selector.clone(),
                requested_at: now,
                expires_at,
            },
        );
        let outcome = match run_script(page, &script).await {
            Ok(Value::Bool(true)) => Ok(()),
            Ok(_) => Err(ActionError::TargetNotFound { role }),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            self.pending.remove(&role);
            return Err(e);
        }

        info!(role = %role, "Highlight applied");
        Ok(ack(kind, role, &selector, false))
    }

    /// Earliest revert deadline among pending highlights.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.expires_at).min()
    }

    pub fn pending(&self, role: ElementRole) -> Option<&PendingAction> {
        self.pending.get(&role)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Revert every highlight whose deadline has passed. Returns how many ran.
    pub async fn revert_expired(&mut self, page: &dyn PageAdapter, now: Instant) -> usize {
        let due: Vec<ElementRole> = self
            .pending
            .iter()
            .filter(|(_, p)| p.expires_at <= now)
            .map(|(role, _)| *role)
            .collect();

        let mut reverted = 0;
        for role in due {
            // Removed before the script runs so a failure never retries it.
            if let Some(pending) = self.pending.remove(&role) {
                self.revert(page, &pending).await;
                reverted += 1;
            }
        }
        reverted
    }

    /// Revert everything now, e.g. when the session stops.
    pub async fn revert_all(&mut self, page: &dyn PageAdapter) -> usize {
        let pending: Vec<PendingAction> = self.pending.drain().map(|(_, p)| p).collect();
        for action in &pending {
            self.revert(page, action).await;
        }
        pending.len()
    }

    async fn revert(&self, page: &dyn PageAdapter, pending: &PendingAction) {
        let script = scripts::revert(&pending.selector);
        match tokio::time::timeout(self.timeout, page.evaluate(&script)).await {
            Ok(Ok(_)) => debug!(role = %pending.role, "Highlight reverted"),
            Ok(Err(e)) => warn!(role = %pending.role, error = %e, "Highlight revert failed"),
            Err(_) => warn!(role = %pending.role, "Highlight revert timed out"),
        }
    }
}

fn validate_amount(amount: f64, current_bid: Option<f64>) -> Result<(), ActionError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ActionError::InvalidParams(format!(
            "bid amount must be a positive number, got {amount}"
        )));
    }
    if let Some(current) = current_bid {
        if amount < current {
            return Err(ActionError::InvalidParams(format!(
                "bid amount {amount} is below the current bid {current}"
            )));
        }
    }
    Ok(())
}

async fn run_script(page: &dyn PageAdapter, script: &str) -> Result<Value, ActionError> {
    page.evaluate(script)
        .await
        .map_err(|e| ActionError::Script(e.to_string()))
}

fn ack(kind: &str, role: ElementRole, selector: &str, coalesced: bool) -> ActionAck {
    ActionAck {
        kind: kind.to_string(),
        role,
        selector: selector.to_string(),
        coalesced,
        revert_at: Some(
            Utc::now() + chrono::Duration::milliseconds(HIGHLIGHT_DURATION.as_millis() as i64),
        ),
    }
}
