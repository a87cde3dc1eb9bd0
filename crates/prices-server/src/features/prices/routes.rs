use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use crate::api::response::ErrorResponse;
use crate::export::ExportError;
use crate::features::FeatureState;
use crate::ingest::{ArchiveError, PipelineError};

use super::{
    commands::IngestPricesCommand,
    queries::ExportPricesQuery,
};

/// Name of the multipart field carrying the archive.
pub const FILE_FIELD: &str = "file";

pub fn prices_routes(max_upload_bytes: usize) -> Router<FeatureState> {
    Router::new()
        .route("/prices", post(ingest_prices).get(export_prices))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[tracing::instrument(skip(state, multipart))]
async fn ingest_prices(
    State(state): State<FeatureState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, PricesApiError> {
    let limit = state.ingest.max_upload_bytes;
    let mut multipart =
        multipart.map_err(|e| PipelineError::Input(format!("Invalid multipart request: {}", e)))?;

    let mut content: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        filename = field.file_name().map(|s| s.to_string());
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        content = Some(data.to_vec());
        break;
    }

    let content = content.ok_or_else(|| {
        PipelineError::Input(format!("Missing '{}' field in multipart data", FILE_FIELD))
    })?;

    let command = IngestPricesCommand {
        content,
        filename,
        scratch_root: state.ingest.scratch_dir.clone(),
    };

    let response = super::commands::ingest::handle(state.catalog.as_ref(), command).await?;

    tracing::info!(
        total_items = response.total_items,
        total_categories = response.total_categories,
        total_price = response.total_price,
        "Prices ingested via API"
    );

    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip(state))]
async fn export_prices(State(state): State<FeatureState>) -> Result<Response, PricesApiError> {
    let query = ExportPricesQuery {
        archive_name: state.export.archive_name.clone(),
        entry_name: state.export.entry_name.clone(),
    };

    let response = super::queries::export::handle(state.catalog.as_ref(), query).await?;

    tracing::debug!(
        rows = response.rows,
        filename = %response.filename,
        "Catalog export generated via API"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", response.filename),
            ),
        ],
        response.content,
    )
        .into_response())
}

fn multipart_error(err: MultipartError, limit: usize) -> PipelineError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::UploadTooLarge { limit }
    } else {
        PipelineError::Input(format!("Failed to read multipart data: {}", err.body_text()))
    }
}

#[derive(Debug)]
enum PricesApiError {
    IngestError(PipelineError),
    ExportError(ExportError),
}

impl From<PipelineError> for PricesApiError {
    fn from(err: PipelineError) -> Self {
        Self::IngestError(err)
    }
}

impl From<ExportError> for PricesApiError {
    fn from(err: ExportError) -> Self {
        Self::ExportError(err)
    }
}

impl PricesApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::IngestError(PipelineError::Input(_)) => StatusCode::BAD_REQUEST,
            Self::IngestError(PipelineError::UploadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::IngestError(PipelineError::Archive(ArchiveError::CsvNotFound)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            },
            Self::IngestError(PipelineError::Archive(e)) if e.is_client_error() => {
                StatusCode::BAD_REQUEST
            },
            Self::IngestError(_) | Self::ExportError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::IngestError(PipelineError::Input(_)) => "INPUT_ERROR",
            Self::IngestError(PipelineError::UploadTooLarge { .. }) => "PAYLOAD_TOO_LARGE",
            Self::IngestError(PipelineError::Archive(ArchiveError::CsvNotFound)) => "CSV_NOT_FOUND",
            Self::IngestError(PipelineError::Archive(e)) if e.is_client_error() => "ARCHIVE_ERROR",
            Self::IngestError(PipelineError::Archive(_)) => "EXTRACTION_ERROR",
            Self::IngestError(PipelineError::Parse(_)) => "PARSE_ERROR",
            Self::IngestError(PipelineError::Storage(_)) | Self::ExportError(ExportError::Storage(_)) => {
                "STORAGE_ERROR"
            },
            Self::IngestError(PipelineError::Worker(_)) => "INTERNAL_ERROR",
            Self::ExportError(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Message returned to the client. Server-side failures stay generic.
    fn client_message(&self) -> String {
        match self {
            Self::IngestError(PipelineError::Archive(e)) if !e.is_client_error() => {
                "Failed to extract archive".to_string()
            },
            Self::IngestError(PipelineError::Storage(_)) | Self::ExportError(ExportError::Storage(_)) => {
                "A storage error occurred".to_string()
            },
            Self::IngestError(PipelineError::Worker(_)) => "Ingest could not be completed".to_string(),
            Self::ExportError(_) => "Failed to build export archive".to_string(),
            Self::IngestError(e) => e.to_string(),
        }
    }
}

impl IntoResponse for PricesApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            Self::IngestError(e) if status.is_server_error() => {
                tracing::error!(stage = e.stage(), error = %e, "Ingest failed");
            },
            Self::IngestError(e) => {
                tracing::warn!(stage = e.stage(), error = %e, "Ingest rejected");
            },
            Self::ExportError(e) => {
                tracing::error!(error = %e, "Export failed");
            },
        }

        let body = match &self {
            Self::IngestError(PipelineError::Parse(e)) => match e.line() {
                Some(line) => {
                    ErrorResponse::with_details(self.code(), self.client_message(), json!({ "line": line }))
                },
                None => ErrorResponse::new(self.code(), self.client_message()),
            },
            _ => ErrorResponse::new(self.code(), self.client_message()),
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for PricesApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IngestError(e) => write!(f, "{}", e),
            Self::ExportError(e) => write!(f, "{}", e),
        }
    }
}
