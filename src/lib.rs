pub mod cache;
pub mod catalog;
pub mod config;
pub mod database;
pub mod element_finder;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod price_parser;
pub mod scheduler;
pub mod scraper;
pub mod utils;

// Re-export commonly used types
pub use cache::ResultCache;
pub use catalog::Catalog;
pub use config::AppConfig;
pub use database::SnapshotStore;
pub use models::{PriceQuery, PriceRecord, PriceStatus, RunContext, Snapshot};
pub use pipeline::PricePipeline;
pub use scheduler::CollectionScheduler;
pub use scraper::{HttpPriceFetcher, PriceFetcher};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
