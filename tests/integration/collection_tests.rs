use std::sync::Arc;
use std::time::Duration;

use grocery_prices::{Catalog, CollectionScheduler, HttpPriceFetcher, PriceStatus, RunContext};
use rust_decimal::Decimal;
use std::str::FromStr;
use wiremock::{MockServer, ResponseTemplate};

use super::*;

async fn scheduler_for(config: &AppConfig) -> (Arc<Catalog>, CollectionScheduler) {
    let catalog = Arc::new(Catalog::from_config(&config.catalog).unwrap());
    let fetcher = Arc::new(HttpPriceFetcher::from_config(Arc::clone(&catalog), &config.collector).unwrap());
    let scheduler = CollectionScheduler::from_config(fetcher, &config.collector);
    (catalog, scheduler)
}

#[tokio::test]
async fn test_two_stores_two_products_with_one_server_error() {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir().unwrap();
    let config = get_test_config(&server, &db_dir, &["milk", "bread"]);

    mount_page(&server, "a", "milk", ResponseTemplate::new(500), 1).await;
    mount_page(&server, "a", "bread", html(store_a_page("45,90 ₽")), 1).await;
    mount_page(&server, "b", "milk", html(store_b_page("1 299,50 руб.")), 1).await;
    mount_page(&server, "b", "bread", html(store_b_page("52.00")), 1).await;

    let (catalog, scheduler) = scheduler_for(&config).await;
    let run = RunContext::new(REGION, Some(capture_date()));
    let snapshot = scheduler.collect(catalog.queries(), &run).await;

    assert_eq!(snapshot.len(), 4);
    let price_of = |store: &str, product: &str| {
        let matching: Vec<_> = snapshot
            .iter()
            .filter(|r| r.store == store && r.product == product)
            .collect();
        assert_eq!(matching.len(), 1, "{}/{}", store, product);
        matching[0].clone()
    };

    let failed = price_of("StoreA", "milk");
    assert_eq!(failed.price, Decimal::ZERO);
    assert_eq!(failed.status, PriceStatus::HttpStatus);

    assert_eq!(price_of("StoreA", "bread").price, Decimal::from_str("45.90").unwrap());
    assert_eq!(price_of("StoreB", "milk").price, Decimal::from_str("1299.50").unwrap());
    assert_eq!(price_of("StoreB", "bread").price, Decimal::from_str("52.00").unwrap());

    assert!(snapshot.iter().all(|r| r.region == REGION));
    assert!(snapshot.iter().all(|r| r.captured_at == capture_date()));
}

#[tokio::test]
async fn test_cyrillic_product_names_are_percent_encoded() {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir().unwrap();
    let product = "молоко 2.5%";
    let config = get_test_config(&server, &db_dir, &[product]);

    mount_page(&server, "a", product, html(store_a_page("89,99 ₽")), 1).await;
    mount_page(&server, "b", product, html(store_b_page("91")), 1).await;

    let (catalog, scheduler) = scheduler_for(&config).await;
    let snapshot = scheduler
        .collect(catalog.queries(), &RunContext::new(REGION, Some(capture_date())))
        .await;

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.found_count(), 2);
    assert!(snapshot.iter().all(|r| r.product == product));
}

#[tokio::test]
async fn test_missing_element_and_garbage_text_become_sentinels() {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir().unwrap();
    let config = get_test_config(&server, &db_dir, &["milk"]);

    mount_page(
        &server,
        "a",
        "milk",
        html("<html><body><p>Ничего не найдено</p></body></html>".to_string()),
        1,
    )
    .await;
    mount_page(&server, "b", "milk", html(store_b_page("по запросу")), 1).await;

    let (catalog, scheduler) = scheduler_for(&config).await;
    let snapshot = scheduler
        .collect(catalog.queries(), &RunContext::new(REGION, Some(capture_date())))
        .await;

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.found_count(), 0);
    let statuses = snapshot.status_counts();
    assert_eq!(statuses.get(&PriceStatus::NotFound), Some(&1));
    assert_eq!(statuses.get(&PriceStatus::ParseError), Some(&1));
}

#[tokio::test]
async fn test_slow_store_times_out_without_blocking_others() {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir().unwrap();
    let mut config = get_test_config(&server, &db_dir, &["milk"]);
    config.collector.request_timeout = 1;

    mount_page(
        &server,
        "a",
        "milk",
        html(store_a_page("10")).set_delay(Duration::from_secs(3)),
        1,
    )
    .await;
    mount_page(&server, "b", "milk", html(store_b_page("20")), 1).await;

    let (catalog, scheduler) = scheduler_for(&config).await;
    let snapshot = scheduler
        .collect(catalog.queries(), &RunContext::new(REGION, Some(capture_date())))
        .await;

    assert_eq!(snapshot.len(), 2);
    let slow = snapshot.iter().find(|r| r.store == "StoreA").unwrap();
    assert_eq!(slow.status, PriceStatus::Timeout);
    assert_eq!(slow.price, Decimal::ZERO);
    let fast = snapshot.iter().find(|r| r.store == "StoreB").unwrap();
    assert_eq!(fast.price, Decimal::from(20));
}
