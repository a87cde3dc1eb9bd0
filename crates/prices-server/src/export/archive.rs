use std::io::{Cursor, Write};

use prices_common::types::CatalogEntry;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ExportError;

/// Header row of the exported CSV.
pub const CSV_HEADER: [&str; 5] = [
    "id",
    "product_name",
    "product_category",
    "product_price",
    "manufacture_date",
];

/// Render catalog rows as CSV with prices at two decimals.
pub fn serialize_csv(entries: &[CatalogEntry]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for entry in entries {
        writer.write_record([
            entry.id.to_string(),
            entry.name.clone(),
            entry.category.clone(),
            entry.formatted_price(),
            entry.formatted_date(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// Wrap `csv` as a single deflated entry named `entry_name`.
pub fn package_archive(csv: &[u8], entry_name: &str) -> Result<Vec<u8>, ExportError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(entry_name, options)?;
    writer.write_all(csv)?;

    // Central directory is only written by finish().
    let buffer = writer.finish()?;
    Ok(buffer.into_inner())
}
