use serde::{Deserialize, Serialize};

use crate::catalog::CatalogStore;
use crate::export::{self, ExportError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPricesQuery {
    /// Download name without the `.zip` extension
    pub archive_name: String,
    /// Name of the CSV entry inside the archive
    pub entry_name: String,
}

#[derive(Debug, Clone)]
pub struct ExportPricesResponse {
    pub filename: String,
    pub rows: usize,
    pub content: Vec<u8>,
}

impl ExportPricesQuery {
    pub fn filename(&self) -> String {
        format!("{}.zip", self.archive_name)
    }
}

#[tracing::instrument(skip(catalog))]
pub async fn handle(
    catalog: &dyn CatalogStore,
    query: ExportPricesQuery,
) -> Result<ExportPricesResponse, ExportError> {
    let filename = query.filename();
    let archive = export::run_export(catalog, query.entry_name).await?;

    Ok(ExportPricesResponse {
        filename,
        rows: archive.rows,
        content: archive.bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalogStore;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    #[tokio::test]
    async fn test_export_empty_catalog() {
        let store = MemoryCatalogStore::new();
        let query = ExportPricesQuery {
            archive_name: "response".to_string(),
            entry_name: "data.csv".to_string(),
        };

        let response = handle(&store, query).await.unwrap();
        assert_eq!(response.filename, "response.zip");
        assert_eq!(response.rows, 0);

        let mut zip = ZipArchive::new(Cursor::new(response.content)).unwrap();
        let mut csv = String::new();
        zip.by_name("data.csv").unwrap().read_to_string(&mut csv).unwrap();
        assert_eq!(
            csv,
            "id,product_name,product_category,product_price,manufacture_date\n"
        );
    }
}
