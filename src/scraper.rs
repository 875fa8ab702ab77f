use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::catalog::{Catalog, StoreEntry};
use crate::config::CollectorConfig;
use crate::models::{PriceQuery, PriceRecord, PriceStatus, RunContext};
use crate::price_parser::{PriceParseError, parse_price};
use crate::utils::error::AppError;

/// Why a single lookup produced no price. Never leaves the fetcher as an
/// error; it is folded into the record's status and detail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchFailure {
    #[error("unknown store: {store}")]
    UnknownStore { store: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("no price element found on {url}")]
    NotFound { url: String },

    #[error("unparseable price text {text:?} matched by '{selector}': {source}")]
    Parse {
        selector: String,
        text: String,
        #[source]
        source: PriceParseError,
    },
}

impl FetchFailure {
    pub fn status(&self) -> PriceStatus {
        match self {
            FetchFailure::UnknownStore { .. } => PriceStatus::UnknownStore,
            FetchFailure::Timeout { .. } => PriceStatus::Timeout,
            FetchFailure::Network { .. } => PriceStatus::Network,
            FetchFailure::HttpStatus { .. } => PriceStatus::HttpStatus,
            FetchFailure::NotFound { .. } => PriceStatus::NotFound,
            FetchFailure::Parse { .. } => PriceStatus::ParseError,
        }
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchFailure::Timeout { url: url.to_string() }
        } else {
            FetchFailure::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Turns a lookup outcome into the record handed to the scheduler.
pub fn into_record(
    query: &PriceQuery,
    run: &RunContext,
    outcome: Result<Decimal, FetchFailure>,
) -> PriceRecord {
    match outcome {
        Ok(price) => PriceRecord::found(query, price, run),
        Err(failure) => PriceRecord::unavailable(query, run, failure.status(), failure.to_string()),
    }
}

/// One (store, product) lookup. Implementations must not fail: every
/// outcome, including errors, is a `PriceRecord`.
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self, query: &PriceQuery, run: &RunContext) -> PriceRecord;
}

pub struct HttpPriceFetcher {
    client: Client,
    catalog: Arc<Catalog>,
}

impl HttpPriceFetcher {
    pub fn new(catalog: Arc<Catalog>, timeout: Duration, user_agent: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, catalog })
    }

    pub fn from_config(catalog: Arc<Catalog>, config: &CollectorConfig) -> Result<Self, AppError> {
        Self::new(catalog, config.timeout(), &config.user_agent)
    }

    /// Issues exactly one GET and extracts the price from the page.
    pub async fn try_fetch(&self, query: &PriceQuery) -> Result<Decimal, FetchFailure> {
        let store = self
            .catalog
            .store(&query.store)
            .ok_or_else(|| FetchFailure::UnknownStore {
                store: query.store.clone(),
            })?;
        let url = store.search_url(&query.product);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "ru-RU,ru;q=0.9,en;q=0.8")
            .send()
            .await
            .map_err(|e| FetchFailure::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchFailure::from_reqwest(&url, e))?;

        extract_price(store, &body, &url)
    }
}

/// Runs selector lookup and price parsing over a fetched page body.
pub fn extract_price(store: &StoreEntry, body: &str, url: &str) -> Result<Decimal, FetchFailure> {
    let element = store
        .finder
        .find(body)
        .ok_or_else(|| FetchFailure::NotFound { url: url.to_string() })?;

    parse_price(&element.text).map_err(|source| FetchFailure::Parse {
        selector: element.selector,
        text: element.text,
        source,
    })
}

#[async_trait]
impl PriceFetcher for HttpPriceFetcher {
    async fn fetch(&self, query: &PriceQuery, run: &RunContext) -> PriceRecord {
        let start_time = Instant::now();
        let outcome = self.try_fetch(query).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        match &outcome {
            Ok(price) => tracing::debug!(
                store = %query.store,
                product = %query.product,
                %price,
                elapsed_ms,
                "price found"
            ),
            Err(failure) => tracing::warn!(
                store = %query.store,
                product = %query.product,
                status = %failure.status(),
                elapsed_ms,
                error = %failure,
                "price unavailable, recording zero"
            ),
        }

        let record = into_record(query, run, outcome);
        metrics::counter!(
            "price_fetch_total",
            "store" => query.store.clone(),
            "status" => record.status.as_str()
        )
        .increment(1);
        record
    }
}
