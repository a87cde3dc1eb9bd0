//! Prices Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the prices workspace.
//!
//! # Overview
//!
//! - **Types**: Price records, catalog entries and aggregate summaries
//! - **Error Handling**: Record validation errors
//! - **Logging**: Centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//! use prices_common::types::PriceRecord;
//! use std::str::FromStr;
//!
//! fn build() -> prices_common::Result<PriceRecord> {
//!     let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default();
//!     PriceRecord::new("Widget", "Tools", BigDecimal::from_str("9.99").unwrap_or_default(), date)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{RecordError, Result};
