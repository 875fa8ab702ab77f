// Shared fixtures for the integration tests: a wiremock server standing in
// for the store search pages and a throwaway SQLite file.

pub mod collection_tests;
pub mod pipeline_tests;

use chrono::NaiveDate;
use grocery_prices::AppConfig;
use grocery_prices::config::{
    CacheConfig, CatalogConfig, CollectorConfig, DatabaseConfig, LoggingConfig, MetricsConfig,
    RunConfig, StoreConfig, default_selectors,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REGION: &str = "Челябинск";

pub fn capture_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 16).unwrap()
}

/// Two stores (`StoreA` under /a, `StoreB` under /b) served by `server`.
pub fn get_test_config(server: &MockServer, db_dir: &TempDir, products: &[&str]) -> AppConfig {
    AppConfig {
        collector: CollectorConfig {
            max_concurrent_fetches: 4,
            pacing_ms: 0,
            request_timeout: 2,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) GroceryPricesTest/1.0".to_string(),
            retry_attempts: 0,
            retry_delay_ms: 10,
        },
        cache: CacheConfig { ttl_secs: 7200 },
        database: DatabaseConfig {
            url: format!("sqlite://{}", db_dir.path().join("prices.db").display()),
            max_connections: 2,
            acquire_timeout: 5,
        },
        run: RunConfig {
            region: REGION.to_string(),
            captured_at: Some(capture_date()),
        },
        catalog: CatalogConfig {
            stores: vec![
                StoreConfig {
                    name: "StoreA".to_string(),
                    url_template: format!("{}/a/search?q={{q}}", server.uri()),
                    selectors: None,
                },
                StoreConfig {
                    name: "StoreB".to_string(),
                    url_template: format!("{}/b/search?q={{q}}", server.uri()),
                    selectors: Some(vec![".cost".to_string()]),
                },
            ],
            products: products.iter().map(|p| p.to_string()).collect(),
            default_selectors: default_selectors(),
        },
        logging: LoggingConfig {
            filter: "grocery_prices=debug".to_string(),
            directory: None,
        },
        metrics: MetricsConfig {
            enabled: false,
            port: 9001,
        },
    }
}

pub fn store_a_page(price: &str) -> String {
    format!(
        r#"<html><body><div class="card"><h3>item</h3><span class="price">{}</span></div></body></html>"#,
        price
    )
}

pub fn store_b_page(price: &str) -> String {
    format!(
        r#"<html><body><ul><li><b class="cost">{}</b></li></ul></body></html>"#,
        price
    )
}

/// Mounts a search-page response for one (store path, product) pair and
/// expects it to be hit exactly `times` times.
pub async fn mount_page(
    server: &MockServer,
    store_path: &str,
    product: &str,
    response: ResponseTemplate,
    times: u64,
) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/search", store_path)))
        .and(query_param("q", product))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

pub fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}
