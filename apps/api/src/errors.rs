use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::reviews::ingest::{IngestError, IngestFailure};
use crate::stores::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestFailure),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                "NOT_AUTHENTICATED",
                "Authentication required".to_string(),
            ),
            AppError::Store(StoreError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
            }
            AppError::Store(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::Ingest(failure) => return ingest_failure_response(failure),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn ingest_failure_response(failure: &IngestFailure) -> Response {
    let error = &failure.error;
    let (status, code) = match error {
        IngestError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
        IngestError::ConversionFailed(_) => (StatusCode::UNPROCESSABLE_ENTITY, "CONVERSION_FAILED"),
        IngestError::UploadFailed { .. } => (StatusCode::BAD_GATEWAY, "UPLOAD_FAILED"),
        IngestError::PersistFailed(_) => (StatusCode::BAD_GATEWAY, "PERSIST_FAILED"),
        IngestError::AnalysisFailed(_) => (StatusCode::BAD_GATEWAY, "ANALYSIS_FAILED"),
    };
    tracing::error!(draft_id = ?failure.draft_id, "Ingestion error: {error}");

    let body = Json(json!({
        "error": {
            "code": code,
            "message": error.user_message(),
            "detail": error.to_string(),
            "draft_id": failure.draft_id,
        }
    }));

    (status, body).into_response()
}
