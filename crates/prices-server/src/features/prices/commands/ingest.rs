use std::path::PathBuf;

use bigdecimal::ToPrimitive;
use prices_common::types::AggregateSummary;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogStore;
use crate::ingest::{self, PipelineError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPricesCommand {
    /// Raw ZIP bytes from the `file` field
    #[serde(skip)]
    pub content: Vec<u8>,
    pub filename: Option<String>,
    pub scratch_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestPricesResponse {
    pub total_items: u64,
    pub total_categories: i64,
    pub total_price: f64,
}

impl From<AggregateSummary> for IngestPricesResponse {
    fn from(summary: AggregateSummary) -> Self {
        Self {
            total_items: summary.items_added,
            total_categories: summary.total_categories,
            total_price: summary.total_price.to_f64().unwrap_or_default(),
        }
    }
}

impl IngestPricesCommand {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.content.is_empty() {
            return Err(PipelineError::Input(
                "Uploaded file is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(catalog, command), fields(filename = ?command.filename, bytes = command.content.len()))]
pub async fn handle(
    catalog: &dyn CatalogStore,
    command: IngestPricesCommand,
) -> Result<IngestPricesResponse, PipelineError> {
    command.validate()?;

    let summary = ingest::run_ingest(catalog, command.content, command.scratch_root).await?;

    Ok(IngestPricesResponse::from(summary))
}
