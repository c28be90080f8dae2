//! Admin HTTP API
//!
//! Small REST surface over the cache manager for operational use:
//! statistics, clearing, invalidation, and expired-entry cleanup.
//! Authorization is the host application's concern; mount this router
//! behind whatever auth layer the deployment uses.

use crate::cache::entry::KeyComponents;
use crate::cache::manager::CacheManager;
use crate::cache::stats::CacheStats;
use crate::error::Error;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Build the admin router
pub fn router(manager: Arc<CacheManager>) -> Router {
    Router::new()
        .route("/cache/stats", get(stats))
        .route("/cache/clear", post(clear))
        .route("/cache/invalidate", post(invalidate))
        .route("/cache/cleanup", post(cleanup))
        .with_state(manager)
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRequest {
    /// Restrict clearing to one tier; omit to clear everything
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
    pub namespace: String,
    /// Target one entry; omit to invalidate the whole namespace
    pub components: Option<KeyComponents>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedResponse {
    pub removed: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: &'static str,
    pub message: String,
}

/// Error wrapper mapping the cache taxonomy onto HTTP statuses
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_caller_error() {
            StatusCode::BAD_REQUEST
        } else if matches!(self.0, Error::StoreUnavailable { .. }) {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            error!(error = %self.0, "admin request failed");
        }

        let body = ApiErrorResponse {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn stats(State(manager): State<Arc<CacheManager>>) -> Result<Json<CacheStats>, ApiError> {
    Ok(Json(manager.stats().await?))
}

async fn clear(
    State(manager): State<Arc<CacheManager>>,
    Json(request): Json<ClearRequest>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = manager.clear(request.tier.as_deref()).await?;
    Ok(Json(RemovedResponse { removed }))
}

async fn invalidate(
    State(manager): State<Arc<CacheManager>>,
    Json(request): Json<InvalidateRequest>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = manager
        .invalidate(&request.namespace, request.components.as_ref())
        .await?;
    Ok(Json(RemovedResponse { removed }))
}

async fn cleanup(
    State(manager): State<Arc<CacheManager>>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = manager.cleanup_expired().await?;
    Ok(Json(RemovedResponse { removed }))
}
