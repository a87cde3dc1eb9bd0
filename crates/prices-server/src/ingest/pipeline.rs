use std::path::{Path, PathBuf};

use prices_common::types::{AggregateSummary, IngestBatch, PriceRecord};
use tracing::{debug, error, info, warn};

use super::aggregate::profile_batch;
use super::{archive, parser, PipelineError};
use crate::catalog::{CatalogError, CatalogStore};

/// Ingest one uploaded archive and report catalog-wide totals.
///
/// The scratch directory is gone before the catalog is touched, and the
/// returned totals are read back from the store after commit.
#[tracing::instrument(skip(catalog, archive), fields(archive_bytes = archive.len()))]
pub async fn run_ingest(
    catalog: &dyn CatalogStore,
    archive: Vec<u8>,
    scratch_root: PathBuf,
) -> Result<AggregateSummary, PipelineError> {
    let batch =
        tokio::task::spawn_blocking(move || load_batch(&archive, &scratch_root)).await??;

    let profile = profile_batch(&batch);
    debug!(
        rows = profile.rows,
        batch_categories = profile.distinct_categories,
        batch_price_sum = %profile.price_sum,
        "Parsed upload"
    );

    let items_added = persist_batch(catalog, &batch).await?;
    let totals = catalog.query_aggregate().await?;

    info!(
        items_added,
        total_categories = totals.distinct_categories,
        total_price = %totals.total_price,
        "Ingest committed"
    );

    Ok(AggregateSummary::from_totals(items_added, totals))
}

fn load_batch(archive: &[u8], scratch_root: &Path) -> Result<IngestBatch, PipelineError> {
    let scratch = archive::extract(archive, scratch_root)?;
    let csv_path = scratch.locate_csv()?;
    let entry = csv_path
        .strip_prefix(scratch.path())
        .unwrap_or(csv_path.as_path());
    debug!(entry = %entry.display(), "Located CSV payload");

    let batch = parser::parse_file(&csv_path)?;
    scratch.release();
    Ok(batch)
}

/// Insert `batch` in a single transaction. Returns the number of rows committed.
///
/// On the first failed insert the transaction is rolled back and the error
/// returned; none of the batch persists.
pub async fn persist_batch(
    catalog: &dyn CatalogStore,
    batch: &[PriceRecord],
) -> Result<u64, CatalogError> {
    let mut tx = catalog.begin_ingest().await?;

    for (index, record) in batch.iter().enumerate() {
        if let Err(e) = tx.insert_record(record).await {
            error!(row = index + 1, rows = batch.len(), error = %e, "Insert failed, rolling back batch");
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            return Err(e);
        }
    }

    tx.commit().await?;
    Ok(batch.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalogStore;
    use bigdecimal::BigDecimal;
    use std::io::{Cursor, Write};
    use std::str::FromStr;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const VALID_CSV: &str = "name,category,price,date\n\
                             Widget,Tools,9.99,2024-01-15\n\
                             Gadget,Tools,19.50,2024-02-01\n";

    #[tokio::test]
    async fn test_run_ingest_reports_catalog_totals() {
        let store = MemoryCatalogStore::new();
        let scratch = tempfile::tempdir().unwrap();

        let summary = run_ingest(
            &store,
            build_zip(&[("data.csv", VALID_CSV)]),
            scratch.path().to_path_buf(),
        )
        .await
        .unwrap();

        assert_eq!(summary.items_added, 2);
        assert_eq!(summary.total_categories, 1);
        assert_eq!(summary.total_price, BigDecimal::from_str("29.49").unwrap());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_commits_nothing() {
        let store = MemoryCatalogStore::new();
        let scratch = tempfile::tempdir().unwrap();
        let csv = "h\nWidget,Tools,9.99,2024-01-15\nFreebie,Promo,free,2024-01-16\n";

        let err = run_ingest(&store, build_zip(&[("data.csv", csv)]), scratch.path().to_path_buf())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Parse(_)));
        assert!(store.is_empty().unwrap());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_persist_batch_rolls_back_on_insert_failure() {
        let csv = "h\n\
                   Widget,Tools,9.99,2024-01-15\n\
                   Gadget,Tools,19.50,2024-02-01\n\
                   Yoyo,Toys,2.01,2024-03-01\n\
                   Lamp,Home,120,2024-06-30\n";
        let batch = parser::parse_batch(csv.as_bytes()).unwrap();

        for failing in [0, 1, batch.len() - 1] {
            let store = MemoryCatalogStore::new();
            store.fail_inserts_at(failing).unwrap();

            assert!(persist_batch(&store, &batch).await.is_err(), "row {failing}");
            assert!(store.is_empty().unwrap(), "row {failing}");
        }
    }

    #[tokio::test]
    async fn test_empty_batch_commits_zero_rows() {
        let store = MemoryCatalogStore::new();
        assert_eq!(persist_batch(&store, &[]).await.unwrap(), 0);
    }
}
