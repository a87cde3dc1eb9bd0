//! Catalog export
//!
//! Reads every committed row, renders it as CSV and packages the CSV as the
//! single entry of a ZIP archive built in memory.

pub mod archive;

use thiserror::Error;
use tokio::task::JoinError;
use zip::result::ZipError;

use crate::catalog::{CatalogError, CatalogStore};

pub use archive::{package_archive, serialize_csv, CSV_HEADER};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Storage(#[from] CatalogError),

    #[error("Failed to serialize CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to build archive: {0}")]
    Archive(#[from] ZipError),

    #[error("Failed to write export buffer: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// A finished export archive
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub bytes: Vec<u8>,
    pub rows: usize,
}

/// Snapshot the whole catalog into a ZIP holding `entry_name`.
#[tracing::instrument(skip(catalog))]
pub async fn run_export(
    catalog: &dyn CatalogStore,
    entry_name: String,
) -> Result<ExportArchive, ExportError> {
    let entries = catalog.query_all().await?;
    let rows = entries.len();

    let bytes = tokio::task::spawn_blocking(move || {
        let csv = serialize_csv(&entries)?;
        package_archive(&csv, &entry_name)
    })
    .await??;

    tracing::info!(rows, archive_bytes = bytes.len(), "Catalog exported");

    Ok(ExportArchive { bytes, rows })
}
