use grocery_prices::{PricePipeline, PriceStatus, SnapshotStore};
use rust_decimal::Decimal;
use wiremock::{MockServer, ResponseTemplate};

use super::*;

async fn mount_two_by_two(server: &MockServer, times: u64) {
    mount_page(server, "a", "milk", ResponseTemplate::new(500), times).await;
    mount_page(server, "a", "bread", html(store_a_page("45,90 ₽")), times).await;
    mount_page(server, "b", "milk", html(store_b_page("95")), times).await;
    mount_page(server, "b", "bread", html(store_b_page("52")), times).await;
}

#[tokio::test]
async fn test_collect_persists_what_it_returns() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir()?;
    let config = get_test_config(&server, &db_dir, &["milk", "bread"]);
    mount_two_by_two(&server, 1).await;

    let pipeline = PricePipeline::from_config(&config).await?;
    let snapshot = pipeline.get_or_collect().await;

    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.found_count(), 3);

    let persisted = pipeline.persisted().await?;
    assert_eq!(persisted.len(), 4);
    for record in snapshot.iter() {
        assert!(persisted.iter().any(|p| p == record), "missing {:?}", record);
    }

    let failed = persisted
        .iter()
        .find(|r| r.store == "StoreA" && r.product == "milk")
        .unwrap();
    assert_eq!(failed.price, Decimal::ZERO);
    assert_eq!(failed.status, PriceStatus::HttpStatus);
    Ok(())
}

#[tokio::test]
async fn test_second_call_within_ttl_makes_no_requests() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir()?;
    let config = get_test_config(&server, &db_dir, &["milk", "bread"]);
    // Each page may be requested once; the server verifies this on drop.
    mount_two_by_two(&server, 1).await;

    let pipeline = PricePipeline::from_config(&config).await?;
    let first = pipeline.get_or_collect().await;
    let second = pipeline.get_or_collect().await;

    assert_eq!(*first, *second);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_force_reload_fetches_everything_again() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir()?;
    let config = get_test_config(&server, &db_dir, &["milk", "bread"]);
    mount_two_by_two(&server, 2).await;

    let pipeline = PricePipeline::from_config(&config).await?;
    pipeline.get_or_collect().await;
    let reloaded = pipeline.force_reload().await;

    assert_eq!(reloaded.len(), 4);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 8);
    assert_eq!(pipeline.store().row_count().await?, 4);
    Ok(())
}

#[tokio::test]
async fn test_snapshot_survives_restart() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir()?;
    let config = get_test_config(&server, &db_dir, &["milk", "bread"]);
    mount_two_by_two(&server, 1).await;

    let pipeline = PricePipeline::from_config(&config).await?;
    let collected = pipeline.get_or_collect().await;
    pipeline.store().close().await;
    drop(pipeline);

    let store = SnapshotStore::connect(&config.database).await?;
    let reloaded = store.load_latest().await?;
    assert_eq!(reloaded.len(), collected.len());
    assert_eq!(reloaded.found_count(), collected.found_count());
    Ok(())
}

#[tokio::test]
async fn test_comparison_picks_cheapest_store() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let db_dir = tempfile::tempdir()?;
    let config = get_test_config(&server, &db_dir, &["kefir"]);
    mount_page(&server, "a", "kefir", html(store_a_page("79,90 ₽")), 1).await;
    mount_page(&server, "b", "kefir", html(store_b_page("74.50")), 1).await;

    let pipeline = PricePipeline::from_config(&config).await?;
    let comparisons = pipeline.get_or_collect().await.comparisons();

    assert_eq!(comparisons.len(), 1);
    assert_eq!(comparisons[0].best_store, "StoreB");
    assert_eq!(comparisons[0].worst_store.as_deref(), Some("StoreA"));
    Ok(())
}
