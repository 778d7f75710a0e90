// Resume review lifecycle: ingestion, reconciliation and deletion across the
// blob store, the key-value store and the analysis service.

pub mod collection;
pub mod delete;
pub mod display;
pub mod handlers;
pub mod ingest;
pub mod reconcile;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisService;
use crate::models::resume::{Feedback, RecordId, ResumeRecord};
use crate::rasterize::Rasterizer;
use crate::reviews::collection::ReviewCollection;
use crate::reviews::delete::{delete_review, DeletionReport, DeletionTarget};
use crate::reviews::display::DisplayRegistry;
use crate::reviews::ingest::{IngestFailure, IngestRequest, IngestTimeouts, Ingestion};
use crate::reviews::reconcile::{reconcile_all, DisplayedReview, SkippedEntry};
use crate::stores::{BlobStore, KvStore, StoreError};

/// The remote collaborators every lifecycle step shares.
#[derive(Clone)]
pub struct ReviewStores {
    pub blobs: Arc<dyn BlobStore>,
    pub kv: Arc<dyn KvStore>,
    pub analyzer: Arc<dyn AnalysisService>,
    pub rasterizer: Arc<dyn Rasterizer>,
}

/// Read model handed to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: RecordId,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub status: &'static str,
    pub feedback: Feedback,
    pub overall_score: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub preview_url: Option<String>,
    pub document_url: Option<String>,
    pub storage_key: String,
}

impl From<&DisplayedReview> for ReviewView {
    fn from(review: &DisplayedReview) -> Self {
        let record = &review.record;
        Self {
            id: record.id.clone(),
            company_name: record.company_name.clone(),
            job_title: record.job_title.clone(),
            job_description: record.job_description.clone(),
            status: if record.feedback.is_complete() {
                "complete"
            } else {
                "pending"
            },
            feedback: record.feedback.clone(),
            overall_score: record.feedback.overall_score(),
            created_at: record.created_at(),
            preview_url: review.preview.as_ref().map(|h| h.url()),
            document_url: record
                .resume_path
                .as_ref()
                .map(|_| format!("/api/v1/reviews/{}/document", record.id)),
            storage_key: review.storage_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub reviews: usize,
    pub skipped: Vec<SkippedEntry>,
    /// Set when the listing failed and the previous collection was kept.
    pub listing_error: Option<String>,
}

/// Owns the canonical collection and the preview registry for one session.
pub struct ReviewService {
    stores: ReviewStores,
    timeouts: IngestTimeouts,
    registry: DisplayRegistry,
    collection: Mutex<ReviewCollection>,
}

impl ReviewService {
    pub fn new(stores: ReviewStores, timeouts: IngestTimeouts) -> Self {
        Self {
            stores,
            timeouts,
            registry: DisplayRegistry::new(),
            collection: Mutex::new(ReviewCollection::new()),
        }
    }

    pub fn registry(&self) -> &DisplayRegistry {
        &self.registry
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<RecordId, IngestFailure> {
        let mut ingestion = Ingestion::new(self.stores.clone(), self.timeouts);
        ingestion
            .run(request)
            .await
            .map_err(|error| IngestFailure {
                error,
                draft_id: ingestion.draft_id().cloned(),
            })
    }

    /// Reconciles and swaps the result in. A failed listing keeps the
    /// current collection untouched.
    ///
    /// The collection lock is held across the whole pass so a delete cannot
    /// interleave with it and have its record reinstalled.
    pub async fn refresh(&self) -> RefreshSummary {
        let mut collection = self.collection.lock().await;
        let reconciliation = reconcile_all(&self.stores, &self.registry).await;
        let count = reconciliation.reviews.len();

        if reconciliation.listing_error.is_none() {
            let released = collection.replace(reconciliation.reviews, &self.registry);
            info!("refresh: {count} reviews in collection, {released} stale previews released");
        }

        RefreshSummary {
            reviews: count,
            skipped: reconciliation.skipped,
            listing_error: reconciliation.listing_error,
        }
    }

    pub async fn list(&self) -> Vec<ReviewView> {
        self.collection
            .lock()
            .await
            .reviews()
            .iter()
            .map(ReviewView::from)
            .collect()
    }

    /// Looks the review up in the collection, reconciling once if it is not
    /// there yet (e.g. it was ingested after the last refresh).
    pub async fn find(&self, id: &RecordId) -> Option<ReviewView> {
        if let Some(view) = self.collection.lock().await.get(id).map(ReviewView::from) {
            return Some(view);
        }
        self.refresh().await;
        self.collection.lock().await.get(id).map(ReviewView::from)
    }

    /// The original document of a review, or `None` if the review (or its
    /// document reference) is unknown.
    pub async fn document(&self, id: &RecordId) -> Result<Option<Bytes>, StoreError> {
        if self.find(id).await.is_none() {
            return Ok(None);
        }
        let resume_path = self
            .collection
            .lock()
            .await
            .get(id)
            .and_then(|r| r.record.resume_path.clone());
        match resume_path {
            Some(path) => self.stores.blobs.read(&path).await.map(Some),
            None => Ok(None),
        }
    }

    /// Removes the review from the collection first, so the view updates no
    /// matter how the remote deletions go. Reviews not in the collection are
    /// looked up under their deterministic key to find their blobs.
    ///
    /// Runs under the collection lock, serialised with `refresh`.
    pub async fn delete(&self, id: &RecordId) -> DeletionReport {
        let mut collection = self.collection.lock().await;
        let target = match collection.take(id) {
            Some(review) => DeletionTarget::from(review),
            None => self.stored_target(id).await,
        };
        delete_review(&self.stores, &self.registry, target).await
    }

    /// Deletion target for a review that was never listed (e.g. ingested
    /// since the last refresh). Blob paths come from the stored record when
    /// it can still be read.
    async fn stored_target(&self, id: &RecordId) -> DeletionTarget {
        let mut target = DeletionTarget::by_id(id.clone());
        let key = id.storage_key();
        match self.stores.kv.get(&key).await {
            Ok(Some(raw)) => match ResumeRecord::decode(&raw) {
                Ok(record) => {
                    debug!(record_id = %id, "delete: not in collection, using stored record");
                    target.resume_blob = record.resume_path;
                    target.image_blob = record.image_path;
                }
                Err(e) => warn!(record_id = %id, "delete: stored record unreadable ({e}), deleting by id"),
            },
            Ok(None) => debug!(record_id = %id, "delete: no stored record under {key}"),
            Err(e) => warn!(record_id = %id, "delete: could not read {key} ({e}), deleting by id"),
        }
        target
    }

    /// Releases every outstanding preview.
    pub async fn shutdown(&self) {
        let released = self.collection.lock().await.clear(&self.registry);
        let leaked = self.registry.live_count();
        if leaked > 0 {
            warn!("{leaked} previews still live after shutdown");
        }
        info!("released {released} previews on shutdown");
    }
}
