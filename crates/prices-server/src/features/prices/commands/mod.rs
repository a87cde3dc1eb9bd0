pub mod ingest;

pub use ingest::{IngestPricesCommand, IngestPricesResponse};
