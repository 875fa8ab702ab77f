use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementMatch {
    pub selector: String,
    pub text: String,
    pub priority: usize, // Index of the matching selector
}

/// Locates the element most likely to hold a product price, trying CSS
/// selectors in priority order.
#[derive(Debug, Clone)]
pub struct PriceElementFinder {
    selectors: Vec<(String, Selector)>,
}

impl PriceElementFinder {
    pub fn new(selectors: &[String]) -> Result<Self, AppError> {
        if selectors.is_empty() {
            return Err(AppError::catalog("at least one price selector is required"));
        }

        let parsed = selectors
            .iter()
            .map(|s| {
                Selector::parse(s)
                    .map(|selector| (s.clone(), selector))
                    .map_err(|e| AppError::catalog(format!("invalid CSS selector '{}': {:?}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { selectors: parsed })
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.selectors.iter().map(|(s, _)| s.as_str())
    }

    /// Returns the first non-empty element matched by the highest-priority
    /// selector that matches anything.
    pub fn find(&self, html_content: &str) -> Option<ElementMatch> {
        let document = Html::parse_document(html_content);

        for (priority, (selector_str, selector)) in self.selectors.iter().enumerate() {
            for element in document.select(selector) {
                let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();

                // Skip empty elements
                if text.is_empty() {
                    continue;
                }

                return Some(ElementMatch {
                    selector: selector_str.clone(),
                    text,
                    priority,
                });
            }
        }

        None
    }
}
