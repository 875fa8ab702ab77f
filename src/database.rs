use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::{PriceRecord, PriceStatus, Snapshot};
use crate::utils::error::{AppError, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// 8 bound columns per row keeps each statement well under SQLite's variable limit.
const INSERT_BATCH_SIZE: usize = 100;

#[derive(Debug, FromRow)]
struct PriceRow {
    product: String,
    store: String,
    price_text: String,
    captured_at: NaiveDate,
    region: String,
    status: PriceStatus,
    detail: Option<String>,
}

impl TryFrom<PriceRow> for PriceRecord {
    type Error = AppError;

    fn try_from(row: PriceRow) -> Result<Self> {
        let price = Decimal::from_str(&row.price_text).map_err(|e| {
            AppError::Internal(format!(
                "stored price {:?} for {}/{} is not a decimal: {}",
                row.price_text, row.store, row.product, e
            ))
        })?;

        Ok(PriceRecord {
            product: row.product,
            store: row.store,
            price,
            captured_at: row.captured_at,
            region: row.region,
            status: row.status,
            detail: row.detail,
        })
    }
}

/// Durable home of the latest snapshot. Every `persist` replaces the
/// previous contents in a single transaction.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        ensure_parent_dir(&config.url)?;
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Replaces the stored snapshot with `snapshot`. Readers observe either
    /// the old rows or the new ones, never a mix.
    pub async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM prices").execute(&mut *tx).await?;

        for chunk in snapshot.records().chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO prices (product, store, price, price_text, captured_at, region, status, detail) ",
            );
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.product.clone())
                    .push_bind(record.store.clone())
                    .push_bind(record.price.to_f64().unwrap_or_default())
                    .push_bind(record.price.to_string())
                    .push_bind(record.captured_at)
                    .push_bind(record.region.clone())
                    .push_bind(record.status)
                    .push_bind(record.detail.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        tracing::info!(rows = snapshot.len(), "snapshot persisted");
        Ok(())
    }

    pub async fn load_latest(&self) -> Result<Snapshot> {
        let rows: Vec<PriceRow> = sqlx::query_as(
            "SELECT product, store, price_text, captured_at, region, status, detail \
             FROM prices ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(PriceRecord::try_from)
            .collect::<Result<Vec<_>>>()
            .map(Snapshot::new)
    }

    pub async fn row_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite creates the file on demand but not the directory holding it.
fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
