//! Category deduplication and price totals
//!
//! Figures reported to clients come from the catalog after commit (see
//! [`crate::catalog::CatalogStore::query_aggregate`]); the batch helpers
//! here only feed diagnostics.

use std::collections::HashSet;
use std::hash::Hash;

use bigdecimal::{BigDecimal, Zero};
use prices_common::types::{CatalogEntry, CatalogTotals, PriceRecord};

/// Number of distinct values, independent of order.
pub fn distinct_count<I>(values: I) -> usize
where
    I: IntoIterator,
    I::Item: Hash + Eq,
{
    values.into_iter().collect::<HashSet<_>>().len()
}

/// Shape of a parsed batch before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProfile {
    pub rows: usize,
    pub distinct_categories: usize,
    pub price_sum: BigDecimal,
}

pub fn profile_batch(batch: &[PriceRecord]) -> BatchProfile {
    BatchProfile {
        rows: batch.len(),
        distinct_categories: distinct_count(batch.iter().map(|r| r.category.as_str())),
        price_sum: batch
            .iter()
            .fold(BigDecimal::zero(), |acc, r| acc + &r.price),
    }
}

/// Catalog-wide totals computed in one pass over committed rows.
pub fn catalog_totals(entries: &[CatalogEntry]) -> CatalogTotals {
    CatalogTotals {
        distinct_categories: distinct_count(entries.iter().map(|e| e.category.as_str())) as i64,
        total_price: entries
            .iter()
            .fold(BigDecimal::zero(), |acc, e| acc + &e.price),
    }
}
