//! Persistence gateway for the price catalog
//!
//! The pipelines only see [`CatalogStore`] and [`IngestTransaction`]; the
//! concrete store is chosen at startup and injected through router state.
//!
//! - [`postgres::PgCatalogStore`]: sqlx + PostgreSQL, used in production
//! - [`memory::MemoryCatalogStore`]: in-process, for local runs and tests
//!
//! # Consistency
//!
//! A batch is inserted inside one transaction and is either fully visible or
//! not at all. Aggregates read after commit see at least the caller's own
//! rows. Two ingests committing concurrently may each report a different
//! snapshot; totals are not linearizable across writers.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use prices_common::types::{CatalogEntry, CatalogTotals, PriceRecord};
use thiserror::Error;

use crate::config::{CatalogBackend, DatabaseConfig};

/// Catalog operation errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// An open ingest transaction.
///
/// Dropping it without calling [`IngestTransaction::commit`] discards every
/// row inserted through it.
#[async_trait]
pub trait IngestTransaction: Send {
    /// Append one row and return the id the store assigned to it.
    async fn insert_record(&mut self, record: &PriceRecord) -> CatalogResult<i64>;

    async fn commit(self: Box<Self>) -> CatalogResult<()>;

    async fn rollback(self: Box<Self>) -> CatalogResult<()>;
}

/// Transactional insert and consistent reads over the whole catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn begin_ingest(&self) -> CatalogResult<Box<dyn IngestTransaction>>;

    /// Distinct category count and price sum over every committed row.
    async fn query_aggregate(&self) -> CatalogResult<CatalogTotals>;

    /// Every committed row, ordered by id ascending.
    async fn query_all(&self) -> CatalogResult<Vec<CatalogEntry>>;

    async fn health_check(&self) -> CatalogResult<()>;
}

/// Shared handle passed to handlers
pub type SharedCatalog = Arc<dyn CatalogStore>;

/// Build the store selected by configuration.
///
/// For PostgreSQL this opens the pool and, when enabled, applies pending
/// migrations.
pub async fn connect(
    backend: CatalogBackend,
    database: &DatabaseConfig,
) -> CatalogResult<SharedCatalog> {
    match backend {
        CatalogBackend::Postgres => {
            let store = postgres::PgCatalogStore::connect(database).await?;
            if database.run_migrations {
                store.migrate().await?;
            }
            Ok(Arc::new(store))
        },
        CatalogBackend::Memory => {
            tracing::warn!("Using the in-memory catalog; data will not survive a restart");
            Ok(Arc::new(memory::MemoryCatalogStore::new()))
        },
    }
}
