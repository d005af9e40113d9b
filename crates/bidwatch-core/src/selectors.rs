//! Ordered fallback selector tables.

use bidwatch_config::ElementSelectors;
use bidwatch_protocols::{ElementRole, PageAdapter, PageError};
use tracing::debug;

/// Return the first selector in `candidates` that matches an element.
pub async fn first_present(
    page: &dyn PageAdapter,
    candidates: &[String],
) -> Result<Option<String>, PageError> {
    for selector in candidates {
        match page.element_exists(selector).await {
            Ok(true) => return Ok(Some(selector.clone())),
            Ok(false) => {}
            Err(PageError::Closed) => return Err(PageError::Closed),
            // An invalid selector on one site should not hide the rest of the table.
            Err(e) => debug!(selector = %selector, error = %e, "Selector lookup failed"),
        }
    }
    Ok(None)
}

/// Selector fallback table per element role.
#[derive(Debug, Clone)]
pub struct SelectorTable {
    elements: ElementSelectors,
}

impl SelectorTable {
    pub fn new(elements: ElementSelectors) -> Self {
        Self { elements }
    }

    pub fn candidates(&self, role: ElementRole) -> &[String] {
        match role {
            ElementRole::BidButton => &self.elements.bid_button,
            ElementRole::PlusButton => &self.elements.plus_button,
            ElementRole::BidInput => &self.elements.bid_input,
        }
    }

    /// Resolve a role to the first selector present on the page.
    pub async fn resolve(
        &self,
        page: &dyn PageAdapter,
        role: ElementRole,
    ) -> Result<Option<String>, PageError> {
        first_present(page, self.candidates(role)).await
    }
}
