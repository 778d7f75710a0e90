//! Ingestion Orchestrator: upload → convert → upload image → persist draft →
//! analyze → persist final.
//!
//! Steps run strictly in sequence. Nothing durable exists before the draft is
//! written, so earlier failures leave no trace. Later failures leave the draft
//! (empty feedback) in place on purpose; no step is retried.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::prompts::prepare_instructions;
use crate::analysis::{parse_feedback, AnalysisError};
use crate::models::document::{Document, PDF_CONTENT_TYPE, PNG_CONTENT_TYPE};
use crate::models::resume::{Feedback, RecordId, ResumeRecord};
use crate::reviews::ReviewStores;

pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestTimeouts {
    /// Applies to each blob upload.
    pub upload: Duration,
    pub analysis: Duration,
}

impl Default for IngestTimeouts {
    fn default() -> Self {
        Self {
            upload: DEFAULT_UPLOAD_TIMEOUT,
            analysis: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }
}

/// What the user supplied on the upload form.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub document: Document,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestErrorKind {
    UploadFailed,
    ConversionFailed,
    PersistFailed,
    AnalysisFailed,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Ready,
    Uploading,
    Converting,
    UploadingImage,
    PersistingDraft,
    Analyzing,
    PersistingFinal,
    Done,
    Failed(IngestErrorKind),
}

impl IngestState {
    /// Progress text shown to the user while the state is current.
    pub fn status_text(&self) -> &'static str {
        match self {
            IngestState::Ready => "Ready",
            IngestState::Uploading => "Uploading the file...",
            IngestState::Converting => "Converting to image...",
            IngestState::UploadingImage => "Uploading the image...",
            IngestState::PersistingDraft => "Preparing data...",
            IngestState::Analyzing => "Analyzing...",
            IngestState::PersistingFinal => "Saving feedback...",
            IngestState::Done => "Analysis complete",
            IngestState::Failed(IngestErrorKind::Timeout) => {
                "Error: Operation timed out. Please try again."
            }
            IngestState::Failed(_) => "Error: Something went wrong during upload.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    Document,
    Image,
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadTarget::Document => f.write_str("file"),
            UploadTarget::Image => f.write_str("image"),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to upload {target}: {reason}")]
    UploadFailed { target: UploadTarget, reason: String },

    #[error("failed to convert document to image: {0}")]
    ConversionFailed(String),

    #[error("failed to persist record: {0}")]
    PersistFailed(String),

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: &'static str, after: Duration },
}

impl IngestError {
    pub fn kind(&self) -> IngestErrorKind {
        match self {
            IngestError::UploadFailed { .. } => IngestErrorKind::UploadFailed,
            IngestError::ConversionFailed(_) => IngestErrorKind::ConversionFailed,
            IngestError::PersistFailed(_) => IngestErrorKind::PersistFailed,
            IngestError::AnalysisFailed(_) => IngestErrorKind::AnalysisFailed,
            IngestError::Timeout { .. } => IngestErrorKind::Timeout,
        }
    }

    /// Message for the user. Timeouts are told apart from other failures.
    pub fn user_message(&self) -> String {
        match self {
            IngestError::UploadFailed { target, .. } => format!("Error: Failed to upload {target}"),
            IngestError::ConversionFailed(_) => {
                "Error: Failed to convert PDF to image".to_string()
            }
            IngestError::PersistFailed(_) => "Error: Failed to save the review".to_string(),
            IngestError::AnalysisFailed(_) => "Error: Failed to analyze resume".to_string(),
            IngestError::Timeout { .. } => {
                IngestState::Failed(IngestErrorKind::Timeout).status_text().to_string()
            }
        }
    }
}

impl From<AnalysisError> for IngestError {
    fn from(e: AnalysisError) -> Self {
        IngestError::AnalysisFailed(e.to_string())
    }
}

/// A failed run, with the id of the draft it left behind, if any.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct IngestFailure {
    pub error: IngestError,
    pub draft_id: Option<RecordId>,
}

/// Races `fut` against `limit`. Once the timer fires the future is dropped, so
/// a late success is never observed; the remote side may still complete.
async fn bounded<T, F>(phase: &'static str, limit: Duration, fut: F) -> Result<T, IngestError>
where
    F: Future<Output = Result<T, IngestError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| IngestError::Timeout {
            phase,
            after: limit,
        })?
}

/// One run of the ingestion pipeline. Keeps its state history so callers can
/// inspect exactly how far it got.
pub struct Ingestion {
    stores: ReviewStores,
    timeouts: IngestTimeouts,
    record_id: RecordId,
    state: IngestState,
    history: Vec<IngestState>,
    draft_persisted: bool,
}

impl Ingestion {
    pub fn new(stores: ReviewStores, timeouts: IngestTimeouts) -> Self {
        Self {
            stores,
            timeouts,
            record_id: RecordId::generate(),
            state: IngestState::Ready,
            history: vec![IngestState::Ready],
            draft_persisted: false,
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn history(&self) -> &[IngestState] {
        &self.history
    }

    /// The record id, once a draft exists in the key-value store.
    pub fn draft_id(&self) -> Option<&RecordId> {
        self.draft_persisted.then_some(&self.record_id)
    }

    fn transition(&mut self, next: IngestState) {
        self.state = next;
        self.history.push(next);
        info!(record_id = %self.record_id, "ingest: {}", next.status_text());
    }

    pub async fn run(&mut self, request: IngestRequest) -> Result<RecordId, IngestError> {
        match self.drive(request).await {
            Ok(id) => {
                self.transition(IngestState::Done);
                Ok(id)
            }
            Err(e) => {
                warn!(
                    record_id = %self.record_id,
                    draft_kept = self.draft_persisted,
                    "ingest failed: {e}"
                );
                self.transition(IngestState::Failed(e.kind()));
                Err(e)
            }
        }
    }

    async fn drive(&mut self, request: IngestRequest) -> Result<RecordId, IngestError> {
        let IngestRequest {
            document,
            company_name,
            job_title,
            job_description,
        } = request;
        let stores = self.stores.clone();

        self.transition(IngestState::Uploading);
        let content_type = if document.content_type.is_empty() {
            PDF_CONTENT_TYPE
        } else {
            document.content_type.as_str()
        };
        let resume_path = bounded("document upload", self.timeouts.upload, async {
            stores
                .blobs
                .upload(&document.file_name, document.bytes.clone(), content_type)
                .await
                .map_err(|e| IngestError::UploadFailed {
                    target: UploadTarget::Document,
                    reason: e.to_string(),
                })
        })
        .await?;

        self.transition(IngestState::Converting);
        let image = stores
            .rasterizer
            .convert(&document)
            .await
            .map_err(|e| IngestError::ConversionFailed(e.to_string()))?;

        self.transition(IngestState::UploadingImage);
        let image_path = bounded("image upload", self.timeouts.upload, async {
            stores
                .blobs
                .upload(&image.file_name, image.bytes.clone(), PNG_CONTENT_TYPE)
                .await
                .map_err(|e| IngestError::UploadFailed {
                    target: UploadTarget::Image,
                    reason: e.to_string(),
                })
        })
        .await?;

        self.transition(IngestState::PersistingDraft);
        let storage_key = self.record_id.storage_key();
        let mut record = ResumeRecord::draft(
            self.record_id.clone(),
            resume_path.clone(),
            image_path,
            company_name,
            job_title,
            job_description,
        );
        self.persist(&storage_key, &record).await?;
        self.draft_persisted = true;

        self.transition(IngestState::Analyzing);
        let instructions = prepare_instructions(&record.job_title, &record.job_description);
        let reply = bounded("analysis", self.timeouts.analysis, async {
            stores
                .analyzer
                .analyze(&resume_path, &instructions)
                .await
                .map_err(IngestError::from)
        })
        .await?;
        let feedback = parse_feedback(reply.feedback_text()?)?;

        // Same key as the draft: the final write replaces it, never duplicates it.
        self.transition(IngestState::PersistingFinal);
        record.feedback = Feedback::Complete(feedback);
        self.persist(&storage_key, &record).await?;

        Ok(self.record_id.clone())
    }

    async fn persist(&self, key: &str, record: &ResumeRecord) -> Result<(), IngestError> {
        let encoded = record
            .encode()
            .map_err(|e| IngestError::PersistFailed(e.to_string()))?;
        self.stores
            .kv
            .set(key, &encoded)
            .await
            .map_err(|e| IngestError::PersistFailed(e.to_string()))
    }
}
