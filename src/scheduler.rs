use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::CollectorConfig;
use crate::models::{PriceQuery, PriceRecord, PriceStatus, RunContext, Snapshot};
use crate::scraper::PriceFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionReport {
    pub run_id: Uuid,
    pub total: usize,
    pub found: usize,
    pub unavailable: usize,
    pub by_status: BTreeMap<PriceStatus, usize>,
    pub elapsed_ms: u64,
}

impl CollectionReport {
    fn new(run: &RunContext, snapshot: &Snapshot, elapsed: Duration) -> Self {
        Self {
            run_id: run.run_id,
            total: snapshot.len(),
            found: snapshot.found_count(),
            unavailable: snapshot.unavailable_count(),
            by_status: snapshot.status_counts(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Global release gate: at most one new fetch per `pacing` period.
struct Pacer {
    interval: Option<Interval>,
}

impl Pacer {
    fn new(pacing: Duration) -> Self {
        let interval = (!pacing.is_zero()).then(|| {
            let mut interval = time::interval(pacing);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { interval }
    }

    async fn ready(&mut self) {
        if let Some(interval) = self.interval.as_mut() {
            interval.tick().await;
        }
    }
}

/// Fans fetches for a batch of queries out over a bounded set of tasks,
/// releasing new work no faster than the pacing interval.
pub struct CollectionScheduler {
    fetcher: Arc<dyn PriceFetcher>,
    concurrency: usize,
    pacing: Duration,
    retry: RetryPolicy,
}

impl CollectionScheduler {
    pub fn new(fetcher: Arc<dyn PriceFetcher>, concurrency: usize, pacing: Duration) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            pacing,
            retry: RetryPolicy::none(),
        }
    }

    pub fn from_config(fetcher: Arc<dyn PriceFetcher>, config: &CollectorConfig) -> Self {
        Self::new(fetcher, config.max_concurrent_fetches, config.pacing()).with_retry(RetryPolicy {
            attempts: config.retry_attempts,
            delay: config.retry_delay(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Runs every query and returns one record per query, in completion
    /// order. Never fails as a whole.
    pub async fn collect(&self, queries: Vec<PriceQuery>, run: &RunContext) -> Snapshot {
        self.collect_with_report(queries, run).await.0
    }

    pub async fn collect_with_report(
        &self,
        queries: Vec<PriceQuery>,
        run: &RunContext,
    ) -> (Snapshot, CollectionReport) {
        let span = tracing::info_span!("collection", run_id = %run.run_id);
        async move {
            let start_time = Instant::now();
            tracing::info!(
                queries = queries.len(),
                concurrency = self.concurrency,
                pacing_ms = self.pacing.as_millis() as u64,
                "starting price collection"
            );

            let snapshot = Snapshot::new(self.drive(queries, run).await);
            let elapsed = start_time.elapsed();
            let report = CollectionReport::new(run, &snapshot, elapsed);

            metrics::counter!("price_collection_runs_total").increment(1);
            metrics::histogram!("price_collection_duration_seconds").record(elapsed.as_secs_f64());

            tracing::info!(
                total = report.total,
                found = report.found,
                unavailable = report.unavailable,
                elapsed_ms = report.elapsed_ms,
                "price collection finished"
            );
            if report.total > 0 && report.found == 0 {
                tracing::warn!("no prices found in this run; selectors or network may be broken");
            }

            (snapshot, report)
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, queries: Vec<PriceQuery>, run: &RunContext) -> Vec<PriceRecord> {
        let total = queries.len();
        let mut pending = queries.into_iter().enumerate();
        let mut next = pending.next();
        // index -> query for every spawned task whose record hasn't come back yet
        let mut outstanding: HashMap<usize, PriceQuery> = HashMap::new();
        let mut in_flight: JoinSet<(usize, PriceRecord)> = JoinSet::new();
        let mut records = Vec::with_capacity(total);
        let mut pacer = Pacer::new(self.pacing);

        loop {
            let can_release = next.is_some() && in_flight.len() < self.concurrency;
            if !can_release && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    match joined {
                        Ok((index, record)) => {
                            outstanding.remove(&index);
                            records.push(record);
                        }
                        Err(e) => tracing::error!(error = %e, "fetch task did not complete"),
                    }
                }
                _ = pacer.ready(), if can_release => {
                    if let Some((index, query)) = next.take() {
                        outstanding.insert(index, query.clone());
                        in_flight.spawn(fetch_one(
                            Arc::clone(&self.fetcher),
                            index,
                            query,
                            run.clone(),
                            self.retry,
                        ));
                        next = pending.next();
                    }
                }
                else => break,
            }
        }

        // Only reachable if a task was cancelled underneath us
        for (_, query) in outstanding {
            records.push(PriceRecord::unavailable(
                &query,
                run,
                PriceStatus::Internal,
                "fetch task was cancelled",
            ));
        }

        records
    }
}

async fn fetch_one(
    fetcher: Arc<dyn PriceFetcher>,
    index: usize,
    query: PriceQuery,
    run: RunContext,
    retry: RetryPolicy,
) -> (usize, PriceRecord) {
    let attempt = AssertUnwindSafe(fetch_with_retry(fetcher.as_ref(), &query, &run, retry))
        .catch_unwind()
        .await;

    let record = match attempt {
        Ok(record) => record,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(
                store = %query.store,
                product = %query.product,
                panic = %message,
                "price fetch panicked"
            );
            PriceRecord::unavailable(
                &query,
                &run,
                PriceStatus::Internal,
                format!("fetch panicked: {}", message),
            )
        }
    };

    (index, record)
}

async fn fetch_with_retry(
    fetcher: &dyn PriceFetcher,
    query: &PriceQuery,
    run: &RunContext,
    retry: RetryPolicy,
) -> PriceRecord {
    if retry.attempts == 0 {
        return fetcher.fetch(query, run).await;
    }

    let strategy = FixedInterval::new(retry.delay).take(retry.attempts as usize);
    let outcome = Retry::spawn(strategy, || async move {
        let record = fetcher.fetch(query, run).await;
        if record.status.is_transient() {
            tracing::debug!(
                store = %query.store,
                product = %query.product,
                status = %record.status,
                "transient failure, retrying"
            );
            Err(record)
        } else {
            Ok(record)
        }
    })
    .await;

    outcome.unwrap_or_else(|record| record)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
