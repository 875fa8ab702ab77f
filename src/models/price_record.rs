use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PriceStatus;

/// One (store, product) unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PriceQuery {
    pub product: String,
    pub store: String,
}

impl PriceQuery {
    pub fn new(store: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            store: store.into(),
        }
    }
}

/// Metadata shared by every record of one collection run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub captured_at: NaiveDate,
    pub region: String,
}

impl RunContext {
    pub fn new(region: impl Into<String>, captured_at: Option<NaiveDate>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            captured_at: captured_at.unwrap_or_else(|| Utc::now().date_naive()),
            region: region.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRecord {
    pub product: String,
    pub store: String,
    /// Parsed price, or zero when `status` is anything but `Found`.
    pub price: Decimal,
    pub captured_at: NaiveDate,
    pub region: String,
    pub status: PriceStatus,
    pub detail: Option<String>,
}

impl PriceRecord {
    pub fn found(query: &PriceQuery, price: Decimal, run: &RunContext) -> Self {
        Self {
            product: query.product.clone(),
            store: query.store.clone(),
            price,
            captured_at: run.captured_at,
            region: run.region.clone(),
            status: PriceStatus::Found,
            detail: None,
        }
    }

    pub fn unavailable(
        query: &PriceQuery,
        run: &RunContext,
        status: PriceStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            product: query.product.clone(),
            store: query.store.clone(),
            price: Decimal::ZERO,
            captured_at: run.captured_at,
            region: run.region.clone(),
            status,
            detail: Some(detail.into()),
        }
    }

    pub fn is_found(&self) -> bool {
        self.status.is_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn run() -> RunContext {
        RunContext::new("Челябинск", NaiveDate::from_ymd_opt(2026, 2, 16))
    }

    #[test]
    fn test_found_record_copies_query_and_run() {
        let query = PriceQuery::new("StoreA", "milk");
        let run = run();
        let record = PriceRecord::found(&query, Decimal::from_str("89.99").unwrap(), &run);

        assert_eq!(record.product, "milk");
        assert_eq!(record.store, "StoreA");
        assert_eq!(record.price.to_string(), "89.99");
        assert_eq!(record.captured_at, run.captured_at);
        assert_eq!(record.region, "Челябинск");
        assert!(record.is_found());
        assert!(record.detail.is_none());
    }

    #[test]
    fn test_unavailable_record_uses_zero_sentinel() {
        let query = PriceQuery::new("StoreA", "milk");
        let record = PriceRecord::unavailable(&query, &run(), PriceStatus::Timeout, "timed out");

        assert_eq!(record.price, Decimal::ZERO);
        assert_eq!(record.status, PriceStatus::Timeout);
        assert_eq!(record.detail.as_deref(), Some("timed out"));
        assert!(!record.is_found());
    }

    #[test]
    fn test_run_context_defaults_to_today() {
        let before = Utc::now().date_naive();
        let run = RunContext::new("Test", None);
        let after = Utc::now().date_naive();
        assert!(run.captured_at == before || run.captured_at == after);
        assert_ne!(run.run_id, RunContext::new("Test", None).run_id);
    }
}
