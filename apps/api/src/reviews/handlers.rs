use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Session;
use crate::errors::AppError;
use crate::models::document::{Document, PDF_CONTENT_TYPE, PNG_CONTENT_TYPE};
use crate::models::resume::RecordId;
use crate::reviews::delete::DeletionReport;
use crate::reviews::ingest::{IngestRequest, IngestState};
use crate::reviews::reconcile::SkippedEntry;
use crate::reviews::ReviewView;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CreateReviewResponse {
    pub id: RecordId,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ReviewListResponse {
    pub reviews: Vec<ReviewView>,
    pub skipped_count: usize,
    pub skipped: Vec<SkippedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
}

/// Reads the upload form. Text fields may be empty; the file must be a
/// non-empty PDF.
async fn read_upload_form(mut multipart: Multipart) -> Result<IngestRequest, AppError> {
    let mut company_name = String::new();
    let mut job_title = String::new();
    let mut job_description = String::new();
    let mut document = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field.content_type().unwrap_or(PDF_CONTENT_TYPE).to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("unreadable file: {e}")))?;
                document = Some(Document::new(file_name, content_type, bytes));
            }
            "company-name" | "job-title" | "job-description" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("unreadable field '{name}': {e}")))?;
                match name.as_str() {
                    "company-name" => company_name = value,
                    "job-title" => job_title = value,
                    _ => job_description = value,
                }
            }
            other => tracing::debug!("ignoring unknown form field '{other}'"),
        }
    }

    let document = document.ok_or_else(|| AppError::Validation("missing 'file' field".to_string()))?;
    if document.bytes.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    // Stored documents are served back as PDF, so only PDFs get in.
    if !document.looks_like_pdf() {
        return Err(AppError::Validation("uploaded file is not a PDF".to_string()));
    }

    Ok(IngestRequest {
        document,
        company_name,
        job_title,
        job_description,
    })
}

/// POST /api/v1/reviews
pub async fn handle_create_review(
    State(state): State<AppState>,
    _session: Session,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreateReviewResponse>), AppError> {
    let request = read_upload_form(multipart).await?;

    // Detached so a client disconnect cannot cut the pipeline short; only
    // its own timeouts end it early.
    let reviews = state.reviews.clone();
    let id = tokio::spawn(async move { reviews.ingest(request).await })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("ingestion task failed: {e}")))??;
    Ok((
        StatusCode::CREATED,
        Json(CreateReviewResponse {
            id,
            status: IngestState::Done.status_text(),
        }),
    ))
}

/// GET /api/v1/reviews
pub async fn handle_list_reviews(
    State(state): State<AppState>,
    _session: Session,
) -> Result<Json<ReviewListResponse>, AppError> {
    let summary = state.reviews.refresh().await;
    Ok(Json(ReviewListResponse {
        reviews: state.reviews.list().await,
        skipped_count: summary.skipped.len(),
        skipped: summary.skipped,
        listing_error: summary.listing_error,
    }))
}

/// GET /api/v1/reviews/:id
pub async fn handle_get_review(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<String>,
) -> Result<Json<ReviewView>, AppError> {
    let id = RecordId::from(id);
    state
        .reviews
        .find(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Review {id} not found")))
}

/// GET /api/v1/reviews/:id/document
pub async fn handle_get_document(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = RecordId::from(id);
    let bytes: Bytes = state
        .reviews
        .document(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No document for review {id}")))?;
    Ok(([(header::CONTENT_TYPE, PDF_CONTENT_TYPE)], bytes))
}

/// DELETE /api/v1/reviews/:id
pub async fn handle_delete_review(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<String>,
) -> Result<Json<DeletionReport>, AppError> {
    Ok(Json(state.reviews.delete(&RecordId::from(id)).await))
}

/// GET /api/v1/previews/:handle
pub async fn handle_get_preview(
    State(state): State<AppState>,
    _session: Session,
    Path(handle): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let image = state
        .reviews
        .registry()
        .fetch(handle)
        .ok_or_else(|| AppError::NotFound(format!("Preview {handle} not found")))?;
    Ok(([(header::CONTENT_TYPE, PNG_CONTENT_TYPE)], image))
}
