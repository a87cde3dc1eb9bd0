//! Prices Server Library
//!
//! HTTP service that ingests zipped CSV price lists into a catalog and
//! exports the catalog back as a zipped CSV.
//!
//! # Overview
//!
//! - **Ingest** (`POST /api/v0/prices`): multipart `file` field holding a ZIP;
//!   the first `.csv` inside is parsed and committed in one transaction
//! - **Export** (`GET /api/v0/prices`): every catalog row as `data.csv` inside
//!   `response.zip`
//! - **Health** (`GET /health`): catalog connectivity probe
//!
//! # Architecture
//!
//! - [`ingest`]: archive extraction, CSV parsing, aggregation and the ingest
//!   pipeline
//! - [`catalog`]: the [`catalog::CatalogStore`] contract with PostgreSQL and
//!   in-memory implementations
//! - [`export`]: CSV serialization and archive packaging
//! - [`features`]: HTTP slices split into commands and queries
//!
//! # Example
//!
//! ```no_run
//! use prices_server::{api, catalog, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = catalog::connect(config.catalog, &config.database).await?;
//!     let app = api::router(store, &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::{AppError, AppResult};
