//! PostgreSQL catalog backed by the `prices` table

use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use prices_common::types::{CatalogEntry, CatalogTotals, PriceRecord};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};

use super::{CatalogResult, CatalogStore, IngestTransaction};
use crate::config::DatabaseConfig;

const INSERT_PRICE: &str = r#"
    INSERT INTO prices (product_name, product_category, product_price, manufacture_date)
    VALUES ($1, $2, $3, $4)
    RETURNING id
"#;

const SELECT_TOTALS: &str = r#"
    SELECT COUNT(DISTINCT product_category) AS distinct_categories,
           COALESCE(SUM(product_price), 0) AS total_price
    FROM prices
"#;

const SELECT_ALL: &str = r#"
    SELECT id, product_name, product_category, product_price, manufacture_date
    FROM prices
    ORDER BY id ASC
"#;

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
    id: i64,
    product_name: String,
    product_category: String,
    product_price: BigDecimal,
    manufacture_date: NaiveDate,
}

impl From<PriceRow> for CatalogEntry {
    fn from(row: PriceRow) -> Self {
        CatalogEntry {
            id: row.id,
            name: row.product_name,
            category: row.product_category,
            price: row.product_price,
            manufacture_date: row.manufacture_date,
        }
    }
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> CatalogResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect_with(config.connect_options()?)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool created"
        );

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> CatalogResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }
}

struct PgIngestTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl IngestTransaction for PgIngestTransaction {
    async fn insert_record(&mut self, record: &PriceRecord) -> CatalogResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(INSERT_PRICE)
            .bind(&record.name)
            .bind(&record.category)
            .bind(&record.price)
            .bind(record.manufacture_date)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CatalogResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn begin_ingest(&self) -> CatalogResult<Box<dyn IngestTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgIngestTransaction { tx }))
    }

    async fn query_aggregate(&self) -> CatalogResult<CatalogTotals> {
        let row = sqlx::query(SELECT_TOTALS).fetch_one(&self.pool).await?;
        Ok(CatalogTotals {
            distinct_categories: row.try_get("distinct_categories")?,
            total_price: row.try_get("total_price")?,
        })
    }

    async fn query_all(&self) -> CatalogResult<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, PriceRow>(SELECT_ALL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CatalogEntry::from).collect())
    }

    async fn health_check(&self) -> CatalogResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
