//! Collection Reconciler: rebuilds the canonical review collection from the
//! flat key-value namespace.
//!
//! Per-entry problems never abort the pass: absent, unreadable and malformed
//! entries are skipped with a recorded reason, and a preview that cannot be
//! fetched only costs the record its preview.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::resume::{RecordId, ResumeRecord, RECORD_KEY_PREFIX};
use crate::reviews::display::{DisplayHandle, DisplayRegistry};
use crate::reviews::ReviewStores;

/// A record as displayed: the stored record, the key it was found under and
/// its preview handle, if the preview could be fetched.
#[derive(Debug)]
pub struct DisplayedReview {
    pub record: ResumeRecord,
    pub storage_key: String,
    pub preview: Option<DisplayHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Listed but gone by the time it was read.
    Absent,
    Unreadable(String),
    Malformed(String),
    /// Another entry with the same id was kept; carries that entry's key.
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub key: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of loading a single key.
enum EntryOutcome {
    Ok(ResumeRecord),
    Skip(SkipReason),
}

#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Deduplicated, in first-seen order.
    pub reviews: Vec<DisplayedReview>,
    pub skipped: Vec<SkippedEntry>,
    /// Set when the key listing itself failed; `reviews` is then empty and the
    /// caller should keep what it already has.
    pub listing_error: Option<String>,
}

/// Deduplicates keys while keeping first-seen order.
fn unique_keys(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.into_iter()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

async fn load_entry(stores: &ReviewStores, key: &str) -> EntryOutcome {
    let raw = match stores.kv.get(key).await {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return EntryOutcome::Skip(SkipReason::Absent),
        Err(e) => return EntryOutcome::Skip(SkipReason::Unreadable(e.to_string())),
    };
    match ResumeRecord::decode(&raw) {
        Ok(record) => EntryOutcome::Ok(record),
        Err(e) => EntryOutcome::Skip(SkipReason::Malformed(e.to_string())),
    }
}

async fn load_preview(
    stores: &ReviewStores,
    registry: &DisplayRegistry,
    record: &ResumeRecord,
) -> Option<DisplayHandle> {
    let image = record.image_path.as_ref()?;
    match stores.blobs.read(image).await {
        Ok(bytes) if !bytes.is_empty() => Some(registry.register(bytes)),
        Ok(_) => {
            debug!(record_id = %record.id, "preview {image} is empty");
            None
        }
        Err(e) => {
            warn!(record_id = %record.id, "preview {image} unavailable: {e}");
            None
        }
    }
}

pub async fn reconcile_all(stores: &ReviewStores, registry: &DisplayRegistry) -> Reconciliation {
    let keys = match stores.kv.list(RECORD_KEY_PREFIX).await {
        Ok(keys) => unique_keys(keys),
        Err(e) => {
            warn!("reconcile: listing {RECORD_KEY_PREFIX}* failed: {e}");
            return Reconciliation {
                listing_error: Some(e.to_string()),
                ..Default::default()
            };
        }
    };

    let mut reviews: Vec<DisplayedReview> = Vec::new();
    let mut positions: HashMap<RecordId, usize> = HashMap::new();
    let mut skipped = Vec::new();

    for key in keys {
        let record = match load_entry(stores, &key).await {
            EntryOutcome::Ok(record) => record,
            EntryOutcome::Skip(reason) => {
                warn!("reconcile: skipping {key}: {reason:?}");
                skipped.push(SkippedEntry { key, reason });
                continue;
            }
        };

        match positions.get(&record.id) {
            None => {
                let preview = load_preview(stores, registry, &record).await;
                positions.insert(record.id.clone(), reviews.len());
                reviews.push(DisplayedReview {
                    record,
                    storage_key: key,
                    preview,
                });
            }
            // A completed analysis displaces a draft, in place. Only presence of
            // feedback is compared: when both duplicates are complete the
            // first-seen one is kept, regardless of createdAt or content.
            Some(&pos)
                if !reviews[pos].record.feedback.is_complete()
                    && record.feedback.is_complete() =>
            {
                let preview = load_preview(stores, registry, &record).await;
                let displaced = std::mem::replace(
                    &mut reviews[pos],
                    DisplayedReview {
                        record,
                        storage_key: key,
                        preview,
                    },
                );
                if let Some(handle) = displaced.preview {
                    registry.release(handle);
                }
                debug!(
                    "reconcile: {} replaced draft {}",
                    reviews[pos].storage_key, displaced.storage_key
                );
                skipped.push(SkippedEntry {
                    key: displaced.storage_key,
                    reason: SkipReason::Duplicate(reviews[pos].storage_key.clone()),
                });
            }
            Some(&pos) => {
                let kept = reviews[pos].storage_key.clone();
                debug!("reconcile: {key} duplicates {kept}");
                skipped.push(SkippedEntry {
                    key,
                    reason: SkipReason::Duplicate(kept),
                });
            }
        }
    }

    info!(
        "reconcile: {} reviews, {} entries skipped",
        reviews.len(),
        skipped.len()
    );
    Reconciliation {
        reviews,
        skipped,
        listing_error: None,
    }
}
