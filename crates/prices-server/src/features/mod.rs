//! Feature modules implementing the prices API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes.
//!
//! # Features
//!
//! - **prices**: archive upload (ingest) and catalog export
//!
//! # Architecture
//!
//! - `commands/` - write operations
//! - `queries/` - read operations
//! - `routes.rs` - HTTP route definitions and error mapping

pub mod prices;

use std::sync::Arc;

use axum::Router;

use crate::catalog::SharedCatalog;
use crate::config::{ExportConfig, IngestConfig};

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Catalog the pipelines read from and write to
    pub catalog: SharedCatalog,
    pub ingest: Arc<IngestConfig>,
    pub export: Arc<ExportConfig>,
}

/// Creates the API router with all feature routes mounted
///
/// - `/prices` - ingest (POST) and export (GET)
pub fn router(state: FeatureState) -> Router<()> {
    let max_upload_bytes = state.ingest.max_upload_bytes;
    Router::new().merge(prices::prices_routes(max_upload_bytes).with_state(state))
}
