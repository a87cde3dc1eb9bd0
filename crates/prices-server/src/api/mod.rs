pub mod response;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::catalog::SharedCatalog;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::features;
use crate::middleware;

/// Path prefix of the versioned API
pub const API_PREFIX: &str = "/api/v0";

/// Application state shared across top-level handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: SharedCatalog,
}

/// Create the application router with all routes and middleware
pub fn router(catalog: SharedCatalog, config: &Config) -> Router {
    let feature_state = features::FeatureState {
        catalog: Arc::clone(&catalog),
        ingest: Arc::new(config.ingest.clone()),
        export: Arc::new(config.export.clone()),
    };

    Router::new()
        .route("/health", get(health_check))
        .with_state(AppState { catalog })
        .nest(API_PREFIX, features::router(feature_state))
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> AppResult<Response> {
    state.catalog.health_check().await.map_err(|e| {
        tracing::error!(error = ?e, "Catalog health check failed");
        AppError::Unavailable("Catalog is unreachable".to_string())
    })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "catalog": "connected"
        })),
    )
        .into_response())
}
