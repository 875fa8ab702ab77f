use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::PriceRecord;

/// Cross-store view of one product's found prices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceComparison {
    pub product: String,
    pub best_store: String,
    pub best_price: Decimal,
    pub worst_store: Option<String>,
    pub worst_price: Option<Decimal>,
    pub average_price: Decimal,
    pub store_count: usize,
}

impl PriceComparison {
    /// Builds a comparison from the records of a single product. Sentinel
    /// rows are skipped; returns `None` if nothing was found.
    pub fn from_records(product: &str, records: &[&PriceRecord]) -> Option<Self> {
        let found: Vec<&PriceRecord> = records.iter().copied().filter(|r| r.is_found()).collect();

        let best = found.iter().min_by(|a, b| a.price.cmp(&b.price))?;

        // Worst only makes sense with more than one source
        let worst = if found.len() > 1 {
            found.iter().max_by(|a, b| a.price.cmp(&b.price))
        } else {
            None
        };

        let total: Decimal = found.iter().map(|r| r.price).sum();
        let average_price = (total / Decimal::from(found.len())).round_dp(2);

        Some(Self {
            product: product.to_string(),
            best_store: best.store.clone(),
            best_price: best.price,
            worst_store: worst.map(|r| r.store.clone()),
            worst_price: worst.map(|r| r.price),
            average_price,
            store_count: found.len(),
        })
    }

    pub fn savings(&self) -> Option<Decimal> {
        self.worst_price.map(|worst| worst - self.best_price)
    }

    pub fn savings_percentage(&self) -> Option<Decimal> {
        let worst = self.worst_price?;
        if worst.is_zero() {
            return None;
        }
        Some((self.savings()? / worst * Decimal::from(100)).round_dp(1))
    }
}
