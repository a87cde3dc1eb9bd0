pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{IngestPricesCommand, IngestPricesResponse};

pub use queries::{ExportPricesQuery, ExportPricesResponse};

pub use routes::prices_routes;
