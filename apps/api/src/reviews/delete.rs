//! Deletion Coordinator: best-effort removal of a review from every store.
//!
//! Each resource is attempted on its own and its failure is logged, never
//! raised. The report tells the caller what was actually freed.

use std::future::Future;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::resume::{BlobRef, RecordId};
use crate::reviews::display::{DisplayHandle, DisplayRegistry};
use crate::reviews::reconcile::DisplayedReview;
use crate::reviews::ReviewStores;
use crate::stores::StoreError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub blob_resume_deleted: bool,
    pub blob_image_deleted: bool,
    pub kv_deleted: bool,
    pub preview_released: bool,
}

/// Everything known about a review that has to go.
#[derive(Debug)]
pub struct DeletionTarget {
    pub id: RecordId,
    /// Key the record was discovered under, if known.
    pub storage_key: Option<String>,
    pub resume_blob: Option<BlobRef>,
    pub image_blob: Option<BlobRef>,
    pub preview: Option<DisplayHandle>,
}

impl DeletionTarget {
    /// A target known only by id: no blobs, the deterministic key.
    pub fn by_id(id: RecordId) -> Self {
        Self {
            id,
            storage_key: None,
            resume_blob: None,
            image_blob: None,
            preview: None,
        }
    }

    fn key(&self) -> String {
        self.storage_key
            .clone()
            .unwrap_or_else(|| self.id.storage_key())
    }
}

impl From<DisplayedReview> for DeletionTarget {
    fn from(review: DisplayedReview) -> Self {
        Self {
            id: review.record.id,
            storage_key: Some(review.storage_key),
            resume_blob: review.record.resume_path,
            image_blob: review.record.image_path,
            preview: review.preview,
        }
    }
}

/// Runs one removal; absence of the target counts as removed.
async fn attempt<F>(id: &RecordId, what: &str, op: F) -> bool
where
    F: Future<Output = Result<(), StoreError>>,
{
    match op.await {
        Ok(()) | Err(StoreError::NotFound(_)) => true,
        Err(e) => {
            warn!(record_id = %id, "delete: {what} not removed: {e}");
            false
        }
    }
}

pub async fn delete_review(
    stores: &ReviewStores,
    registry: &DisplayRegistry,
    target: DeletionTarget,
) -> DeletionReport {
    let mut report = DeletionReport::default();
    let id = &target.id;

    if let Some(blob) = &target.resume_blob {
        report.blob_resume_deleted =
            attempt(id, "resume blob", stores.blobs.delete(blob)).await;
    }
    if let Some(blob) = &target.image_blob {
        report.blob_image_deleted = attempt(id, "image blob", stores.blobs.delete(blob)).await;
    }

    let key = target.key();
    report.kv_deleted = attempt(id, "record", stores.kv.delete(&key)).await;

    if let Some(handle) = target.preview {
        report.preview_released = registry.release(handle);
    }

    info!(record_id = %target.id, ?report, "delete: finished");
    report
}
