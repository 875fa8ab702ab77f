use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{PriceComparison, PriceRecord, PriceStatus};

/// Every record produced by one collection run. Row order is completion
/// order and carries no meaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    records: Vec<PriceRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<PriceRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn found_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_found()).count()
    }

    pub fn unavailable_count(&self) -> usize {
        self.len() - self.found_count()
    }

    pub fn status_counts(&self) -> BTreeMap<PriceStatus, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    /// Copy restricted to the given stores; an empty filter keeps everything.
    pub fn filter_stores(&self, stores: &[String]) -> Snapshot {
        if stores.is_empty() {
            return self.clone();
        }
        Snapshot::new(
            self.records
                .iter()
                .filter(|r| stores.iter().any(|s| s == &r.store))
                .cloned()
                .collect(),
        )
    }

    /// Cheapest successfully parsed price across the whole snapshot.
    pub fn cheapest(&self) -> Option<&PriceRecord> {
        self.records
            .iter()
            .filter(|r| r.is_found())
            .min_by(|a, b| a.price.cmp(&b.price))
    }

    /// Per-product comparison across stores, sorted by product name.
    /// Products with no found price are omitted.
    pub fn comparisons(&self) -> Vec<PriceComparison> {
        let mut by_product: BTreeMap<&str, Vec<&PriceRecord>> = BTreeMap::new();
        for record in &self.records {
            by_product.entry(record.product.as_str()).or_default().push(record);
        }

        by_product
            .into_iter()
            .filter_map(|(product, records)| PriceComparison::from_records(product, &records))
            .collect()
    }

    /// Records sorted by price, unavailable rows last.
    pub fn sorted_by_price(&self) -> Vec<&PriceRecord> {
        let mut rows: Vec<&PriceRecord> = self.records.iter().collect();
        rows.sort_by(|a, b| {
            b.is_found()
                .cmp(&a.is_found())
                .then(a.price.cmp(&b.price))
                .then(a.product.cmp(&b.product))
                .then(a.store.cmp(&b.store))
        });
        rows
    }
}

impl FromIterator<PriceRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = PriceRecord>>(iter: I) -> Self {
        Snapshot::new(iter.into_iter().collect())
    }
}
