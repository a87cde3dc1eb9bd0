//! Upload ingestion
//!
//! ```text
//! ZIP bytes -> archive::extract -> ScratchArea::locate_csv -> parser::parse_file
//!           -> CatalogStore transaction -> CatalogStore::query_aggregate
//! ```
//!
//! Blocking filesystem work runs on the blocking pool; the catalog calls are
//! async. Nothing is committed unless every row parsed and inserted.

pub mod aggregate;
pub mod archive;
pub mod parser;
pub mod pipeline;

use thiserror::Error;
use tokio::task::JoinError;

use crate::catalog::CatalogError;

pub use archive::ArchiveError;
pub use parser::ParseError;
pub use pipeline::{persist_batch, run_ingest};

/// Failure of an ingest request, tagged by stage
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Input(String),

    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] CatalogError),

    #[error("Ingest worker failed: {0}")]
    Worker(#[from] JoinError),
}

impl PipelineError {
    /// Pipeline stage the error was raised in, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Input(_) | PipelineError::UploadTooLarge { .. } => "input",
            PipelineError::Archive(e) if e.is_client_error() => "archive",
            PipelineError::Archive(_) => "extraction",
            PipelineError::Parse(_) => "parse",
            PipelineError::Storage(_) => "storage",
            PipelineError::Worker(_) => "worker",
        }
    }
}
