use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::HashSet;
use url::Url;

use crate::config::{CatalogConfig, StoreConfig};
use crate::element_finder::PriceElementFinder;
use crate::models::PriceQuery;
use crate::utils::error::AppError;

pub const QUERY_PLACEHOLDER: &str = "{q}";

// RFC 3986 unreserved characters stay as-is, everything else is encoded
// (space becomes %20, never '+').
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub name: String,
    pub url_template: String,
    pub finder: PriceElementFinder,
}

impl StoreEntry {
    fn from_config(config: &StoreConfig, default_selectors: &[String]) -> Result<Self, AppError> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(AppError::catalog("store name must not be empty"));
        }

        if !config.url_template.contains(QUERY_PLACEHOLDER) {
            return Err(AppError::catalog(format!(
                "url_template for store '{}' has no {} placeholder",
                name, QUERY_PLACEHOLDER
            )));
        }

        let probe = config.url_template.replace(QUERY_PLACEHOLDER, "probe");
        let parsed = Url::parse(&probe).map_err(|e| {
            AppError::catalog(format!("invalid url_template for store '{}': {}", name, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::catalog(format!(
                "url_template for store '{}' must be http or https",
                name
            )));
        }

        let selectors = config.selectors.as_deref().unwrap_or(default_selectors);
        let finder = PriceElementFinder::new(selectors)?;

        Ok(Self {
            name: name.to_string(),
            url_template: config.url_template.clone(),
            finder,
        })
    }

    pub fn search_url(&self, product: &str) -> String {
        let encoded = utf8_percent_encode(product, QUERY_ENCODE_SET).to_string();
        self.url_template.replace(QUERY_PLACEHOLDER, &encoded)
    }
}

/// Static store registry plus the ordered product list to look up in each.
#[derive(Debug, Clone)]
pub struct Catalog {
    stores: Vec<StoreEntry>,
    products: Vec<String>,
}

impl Catalog {
    pub fn from_config(config: &CatalogConfig) -> Result<Self, AppError> {
        if config.stores.is_empty() {
            return Err(AppError::catalog("catalog has no stores"));
        }
        if config.products.is_empty() {
            return Err(AppError::catalog("catalog has no products"));
        }

        let mut seen = HashSet::new();
        let mut stores = Vec::with_capacity(config.stores.len());
        for store_config in &config.stores {
            let store = StoreEntry::from_config(store_config, &config.default_selectors)?;
            if !seen.insert(store.name.clone()) {
                return Err(AppError::catalog(format!("duplicate store '{}'", store.name)));
            }
            stores.push(store);
        }

        if let Some(position) = config.products.iter().position(|p| p.trim().is_empty()) {
            return Err(AppError::catalog(format!(
                "product #{} has an empty name",
                position + 1
            )));
        }

        Ok(Self {
            stores,
            products: config.products.clone(),
        })
    }

    pub fn store(&self, name: &str) -> Option<&StoreEntry> {
        self.stores.iter().find(|s| s.name == name)
    }

    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores.iter().map(|s| s.name.as_str())
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }

    /// Every (store, product) pair, store-major. Duplicate products yield
    /// duplicate queries.
    pub fn queries(&self) -> Vec<PriceQuery> {
        self.stores
            .iter()
            .flat_map(|store| {
                self.products
                    .iter()
                    .map(move |product| PriceQuery::new(store.name.clone(), product.clone()))
            })
            .collect()
    }
}
