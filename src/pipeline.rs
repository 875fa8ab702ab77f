use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::cache::{CacheOutcome, CacheStatus, ResultCache};
use crate::catalog::Catalog;
use crate::config::{AppConfig, RunConfig};
use crate::database::SnapshotStore;
use crate::models::{RunContext, Snapshot};
use crate::scheduler::CollectionScheduler;
use crate::scraper::{HttpPriceFetcher, PriceFetcher};
use crate::utils::error::Result;

/// Cache slot for the full catalog cross product.
pub const FULL_CATALOG_KEY: &str = "catalog:all";

/// Catalog -> scheduler -> cache -> store.
pub struct PricePipeline {
    catalog: Arc<Catalog>,
    scheduler: CollectionScheduler,
    cache: ResultCache,
    store: SnapshotStore,
    ttl: Duration,
    run: RunConfig,
}

impl PricePipeline {
    pub fn new(
        catalog: Arc<Catalog>,
        scheduler: CollectionScheduler,
        store: SnapshotStore,
        ttl: Duration,
        run: RunConfig,
    ) -> Self {
        Self {
            catalog,
            scheduler,
            cache: ResultCache::new(),
            store,
            ttl,
            run,
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let catalog = Arc::new(Catalog::from_config(&config.catalog)?);
        let fetcher: Arc<dyn PriceFetcher> =
            Arc::new(HttpPriceFetcher::from_config(Arc::clone(&catalog), &config.collector)?);
        let scheduler = CollectionScheduler::from_config(fetcher, &config.collector);
        let store = SnapshotStore::connect(&config.database).await?;

        tracing::info!(
            stores = catalog.store_names().count(),
            products = catalog.products().len(),
            "price pipeline ready"
        );

        Ok(Self::new(
            catalog,
            scheduler,
            store,
            config.cache.ttl(),
            config.run.clone(),
        ))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Cached snapshot if still fresh, otherwise a new collection that is
    /// persisted before it is returned.
    pub async fn get_or_collect(&self) -> Arc<Snapshot> {
        let (snapshot, outcome) = self
            .cache
            .get_or_collect_with_outcome(FULL_CATALOG_KEY, self.ttl, || self.collect_and_persist())
            .await;

        if outcome == CacheOutcome::Hit {
            tracing::debug!(records = snapshot.len(), "returning cached prices");
        }
        snapshot
    }

    /// Discards the cached snapshot and collects everything again.
    pub async fn force_reload(&self) -> Arc<Snapshot> {
        tracing::info!("full reload requested");
        self.cache.invalidate(FULL_CATALOG_KEY).await;
        self.get_or_collect().await
    }

    /// Snapshot as last written to the store, without touching the network.
    pub async fn persisted(&self) -> Result<Snapshot> {
        self.store.load_latest().await
    }

    pub async fn cache_status(&self) -> Option<CacheStatus> {
        self.cache.status().await
    }

    /// Calls `get_or_collect` every `interval` until `shutdown` resolves.
    /// Shutdown also cancels a collection that is still running. Returns the
    /// number of completed refreshes.
    pub async fn watch<S>(&self, interval: Duration, shutdown: S) -> usize
    where
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut refreshes = 0;
        loop {
            let refresh = async {
                ticker.tick().await;
                self.get_or_collect().await
            };

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(refreshes, "stopping watch");
                    return refreshes;
                }
                snapshot = refresh => {
                    refreshes += 1;
                    let age_secs = self.cache_status().await.map(|s| s.age_secs).unwrap_or_default();
                    tracing::info!(
                        records = snapshot.len(),
                        found = snapshot.found_count(),
                        age_secs,
                        "prices available"
                    );
                }
            }
        }
    }

    async fn collect_and_persist(&self) -> Snapshot {
        let run = RunContext::new(self.run.region.clone(), self.run.captured_at);
        let snapshot = self.scheduler.collect(self.catalog.queries(), &run).await;

        // The collected data stays authoritative even if the write fails.
        match self.store.persist(&snapshot).await {
            Ok(()) => {
                metrics::counter!("price_snapshot_persist_total", "outcome" => "ok").increment(1);
            }
            Err(e) => {
                metrics::counter!("price_snapshot_persist_total", "outcome" => "error").increment(1);
                tracing::warn!(error = %e, run_id = %run.run_id, "failed to persist snapshot");
            }
        }

        snapshot
    }
}
