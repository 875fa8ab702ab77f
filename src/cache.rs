use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::Snapshot;

pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

struct CacheEntry {
    key: String,
    snapshot: Arc<Snapshot>,
    produced_at: Instant,
    produced_at_utc: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh_for(&self, key: &str, now: Instant) -> bool {
        self.key == key && now.duration_since(self.produced_at) <= self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
        }
    }

    fn record(self) -> Self {
        metrics::counter!("price_cache_requests_total", "outcome" => self.as_str()).increment(1);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub key: String,
    pub records: usize,
    pub produced_at: DateTime<Utc>,
    pub age_secs: u64,
    pub ttl_secs: u64,
    pub expired: bool,
}

/// Single-slot cache for the most recent snapshot.
///
/// The slot lock is held while a miss is being collected, so callers that
/// arrive during a collection wait for it and then see its result instead
/// of starting their own run.
#[derive(Default)]
pub struct ResultCache {
    slot: Mutex<Option<CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached snapshot for `key` if it is younger than `ttl`,
    /// otherwise awaits `collect` and stores its result.
    pub async fn get_or_collect<F, Fut>(&self, key: &str, ttl: Duration, collect: F) -> Arc<Snapshot>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Snapshot>,
    {
        self.get_or_collect_with_outcome(key, ttl, collect).await.0
    }

    pub async fn get_or_collect_with_outcome<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        collect: F,
    ) -> (Arc<Snapshot>, CacheOutcome)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Snapshot>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(entry) = slot.as_ref() {
            if entry.is_fresh_for(key, Instant::now()) {
                tracing::debug!(
                    key,
                    age_secs = entry.produced_at.elapsed().as_secs(),
                    "serving cached snapshot"
                );
                return (Arc::clone(&entry.snapshot), CacheOutcome::Hit.record());
            }
        }

        match slot.as_ref() {
            Some(entry) if entry.key != key => {
                tracing::info!(key, previous = %entry.key, "cache key changed, collecting")
            }
            Some(_) => tracing::info!(key, "cached snapshot expired, collecting"),
            None => tracing::info!(key, "cache empty, collecting"),
        }
        let outcome = CacheOutcome::Miss.record();

        let snapshot = Arc::new(collect().await);
        *slot = Some(CacheEntry {
            key: key.to_string(),
            snapshot: Arc::clone(&snapshot),
            produced_at: Instant::now(),
            produced_at_utc: Utc::now(),
            ttl,
        });

        (snapshot, outcome)
    }

    /// Drops the entry if it belongs to `key`. Returns whether anything was removed.
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|entry| entry.key == key) {
            *slot = None;
            tracing::info!(key, "cache entry invalidated");
            true
        } else {
            false
        }
    }

    pub async fn clear(&self) {
        self.slot.lock().await.take();
    }

    pub async fn status(&self) -> Option<CacheStatus> {
        let slot = self.slot.lock().await;
        slot.as_ref().map(|entry| {
            let age = entry.produced_at.elapsed();
            CacheStatus {
                key: entry.key.clone(),
                records: entry.snapshot.len(),
                produced_at: entry.produced_at_utc,
                age_secs: age.as_secs(),
                ttl_secs: entry.ttl.as_secs(),
                expired: age > entry.ttl,
            }
        })
    }
}
