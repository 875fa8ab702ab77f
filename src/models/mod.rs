use serde::{Deserialize, Serialize};

pub mod price_comparison;
pub mod price_record;
pub mod snapshot;

// Re-exports for convenience
pub use price_comparison::*;
pub use price_record::*;
pub use snapshot::*;

/// Outcome of one price lookup. Everything except `Found` carries the zero
/// price sentinel.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum PriceStatus {
    #[sqlx(rename = "found")]
    Found,
    #[sqlx(rename = "timeout")]
    Timeout,
    #[sqlx(rename = "network")]
    Network,
    #[sqlx(rename = "http_status")]
    HttpStatus,
    #[sqlx(rename = "not_found")]
    NotFound,
    #[sqlx(rename = "parse_error")]
    ParseError,
    #[sqlx(rename = "unknown_store")]
    UnknownStore,
    #[sqlx(rename = "internal")]
    Internal,
}

impl PriceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceStatus::Found => "found",
            PriceStatus::Timeout => "timeout",
            PriceStatus::Network => "network",
            PriceStatus::HttpStatus => "http_status",
            PriceStatus::NotFound => "not_found",
            PriceStatus::ParseError => "parse_error",
            PriceStatus::UnknownStore => "unknown_store",
            PriceStatus::Internal => "internal",
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PriceStatus::Found)
    }

    /// Failures worth another attempt; the page itself may be fine.
    pub fn is_transient(&self) -> bool {
        matches!(self, PriceStatus::Timeout | PriceStatus::Network)
    }
}

impl std::fmt::Display for PriceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
