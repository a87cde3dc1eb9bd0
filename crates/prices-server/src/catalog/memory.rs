//! In-process catalog
//!
//! Rows live behind a mutex; a transaction buffers its inserts and appends
//! them under the lock on commit, so readers never observe half a batch.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use prices_common::types::{CatalogEntry, CatalogTotals, PriceRecord};

use super::{CatalogError, CatalogResult, CatalogStore, IngestTransaction};
use crate::ingest::aggregate::catalog_totals;

#[derive(Debug, Default)]
struct MemoryCatalog {
    rows: Vec<CatalogEntry>,
    /// Last id handed out; ids consumed by rolled-back batches are not reused.
    last_id: i64,
    /// Fail the insert at this zero-based position within every transaction.
    fail_insert_at: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogStore {
    inner: Arc<Mutex<MemoryCatalog>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every transaction fail on its `index`-th insert.
    ///
    /// Test-only fault injection; nothing outside tests calls this.
    #[doc(hidden)]
    pub fn fail_inserts_at(&self, index: usize) -> CatalogResult<()> {
        self.lock()?.fail_insert_at = Some(index);
        Ok(())
    }

    /// Number of committed rows.
    pub fn len(&self) -> CatalogResult<usize> {
        Ok(self.lock()?.rows.len())
    }

    pub fn is_empty(&self) -> CatalogResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> CatalogResult<MutexGuard<'_, MemoryCatalog>> {
        lock(&self.inner)
    }
}

fn lock(inner: &Mutex<MemoryCatalog>) -> CatalogResult<MutexGuard<'_, MemoryCatalog>> {
    inner
        .lock()
        .map_err(|_| CatalogError::Unavailable("in-memory catalog lock poisoned".to_string()))
}

struct MemoryIngestTransaction {
    inner: Arc<Mutex<MemoryCatalog>>,
    pending: Vec<CatalogEntry>,
}

#[async_trait]
impl IngestTransaction for MemoryIngestTransaction {
    async fn insert_record(&mut self, record: &PriceRecord) -> CatalogResult<i64> {
        let mut catalog = lock(&self.inner)?;
        if catalog.fail_insert_at == Some(self.pending.len()) {
            return Err(CatalogError::Unavailable(format!(
                "insert {} rejected",
                self.pending.len()
            )));
        }

        catalog.last_id += 1;
        let id = catalog.last_id;
        drop(catalog);

        self.pending.push(CatalogEntry::from_record(id, record.clone()));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        let MemoryIngestTransaction { inner, pending } = *self;
        lock(&inner)?.rows.extend(pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CatalogResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn begin_ingest(&self) -> CatalogResult<Box<dyn IngestTransaction>> {
        Ok(Box::new(MemoryIngestTransaction {
            inner: Arc::clone(&self.inner),
            pending: Vec::new(),
        }))
    }

    async fn query_aggregate(&self) -> CatalogResult<CatalogTotals> {
        Ok(catalog_totals(&self.lock()?.rows))
    }

    async fn query_all(&self) -> CatalogResult<Vec<CatalogEntry>> {
        // Ids are assigned at insert time, so concurrent commits may land out of order.
        let mut rows = self.lock()?.rows.clone();
        rows.sort_by_key(|entry| entry.id);
        Ok(rows)
    }

    async fn health_check(&self) -> CatalogResult<()> {
        self.lock().map(|_| ())
    }
}
