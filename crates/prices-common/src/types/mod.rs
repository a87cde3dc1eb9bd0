//! Domain types shared by the ingest and export pipelines

use bigdecimal::{BigDecimal, RoundingMode, Signed, Zero};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};

/// Literal format of manufacture dates, both on input and on export.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Number of decimal places prices are rendered with on export.
pub const PRICE_SCALE: i64 = 2;

/// A validated price row parsed from an uploaded CSV.
///
/// All four fields are always present and valid; use [`PriceRecord::new`]
/// to construct one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub name: String,
    pub category: String,
    pub price: BigDecimal,
    pub manufacture_date: NaiveDate,
}

impl PriceRecord {
    /// Build a record, rejecting empty names/categories and negative prices.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        price: BigDecimal,
        manufacture_date: NaiveDate,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RecordError::EmptyName);
        }

        let category = category.into();
        if category.trim().is_empty() {
            return Err(RecordError::EmptyCategory);
        }

        if price.is_negative() {
            return Err(RecordError::NegativePrice(price.to_string()));
        }

        Ok(Self {
            name,
            category,
            price,
            manufacture_date,
        })
    }
}

/// Ordered records parsed from a single upload.
pub type IngestBatch = Vec<PriceRecord>;

/// A persisted catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Surrogate id assigned by the store
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: BigDecimal,
    pub manufacture_date: NaiveDate,
}

impl CatalogEntry {
    pub fn from_record(id: i64, record: PriceRecord) -> Self {
        Self {
            id,
            name: record.name,
            category: record.category,
            price: record.price,
            manufacture_date: record.manufacture_date,
        }
    }

    /// Price rounded half-up and padded to exactly two decimals, e.g. `19.50`.
    pub fn formatted_price(&self) -> String {
        format_price(&self.price)
    }

    /// Manufacture date as `YYYY-MM-DD`.
    pub fn formatted_date(&self) -> String {
        self.manufacture_date.format(DATE_FORMAT).to_string()
    }
}

/// Render a price with exactly [`PRICE_SCALE`] decimal places.
pub fn format_price(price: &BigDecimal) -> String {
    price
        .with_scale_round(PRICE_SCALE, RoundingMode::HalfUp)
        .to_plain_string()
}

/// Catalog-wide figures returned by the store's aggregate query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTotals {
    pub distinct_categories: i64,
    pub total_price: BigDecimal,
}

impl CatalogTotals {
    pub fn empty() -> Self {
        Self {
            distinct_categories: 0,
            total_price: BigDecimal::zero(),
        }
    }
}

/// Statistics reported after an ingest.
///
/// `items_added` is local to the batch; the other two cover the whole
/// catalog as observed after the batch committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub items_added: u64,
    pub total_categories: i64,
    pub total_price: BigDecimal,
}

impl AggregateSummary {
    pub fn from_totals(items_added: u64, totals: CatalogTotals) -> Self {
        Self {
            items_added,
            total_categories: totals.distinct_categories,
            total_price: totals.total_price,
        }
    }
}
