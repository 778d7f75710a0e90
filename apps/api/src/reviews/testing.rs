//! Scripted collaborators for lifecycle tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::analysis::{AnalysisError, AnalysisReply, AnalysisService};
use crate::llm_client::LlmError;
use crate::models::document::{Document, RasterImage, PDF_CONTENT_TYPE};
use crate::models::resume::BlobRef;
use crate::rasterize::{RasterizeError, Rasterizer};
use crate::reviews::ingest::IngestRequest;
use crate::reviews::ReviewStores;
use crate::stores::{BlobStore, KvStore, MemoryBlobStore, MemoryKvStore, StoreError};

pub fn pdf_request(company_name: &str, job_title: &str) -> IngestRequest {
    IngestRequest {
        document: Document::new(
            "cv.pdf",
            PDF_CONTENT_TYPE,
            Bytes::from_static(b"%PDF-1.4 test resume"),
        ),
        company_name: company_name.to_string(),
        job_title: job_title.to_string(),
        job_description: "Build reliable services".to_string(),
    }
}

/// Memory-backed blob store with injectable failures and latency.
#[derive(Default)]
pub struct ScriptedBlobStore {
    pub inner: MemoryBlobStore,
    fail_upload_at: Option<usize>,
    upload_delay: Option<Duration>,
    fail_deletes: bool,
    uploads: AtomicUsize,
}

impl ScriptedBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `n`th upload (0-based).
    pub fn failing_upload(n: usize) -> Self {
        Self {
            fail_upload_at: Some(n),
            ..Self::default()
        }
    }

    pub fn slow_uploads(delay: Duration) -> Self {
        Self {
            upload_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for ScriptedBlobStore {
    async fn upload(
        &self,
        file_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<BlobRef, StoreError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_upload_at == Some(n) {
            return Err(StoreError::Connection("upload refused".to_string()));
        }
        self.inner.upload(file_name, bytes, content_type).await
    }

    async fn read(&self, blob: &BlobRef) -> Result<Bytes, StoreError> {
        self.inner.read(blob).await
    }

    async fn delete(&self, blob: &BlobRef) -> Result<(), StoreError> {
        if self.fail_deletes {
            return Err(StoreError::Backend("delete refused".to_string()));
        }
        self.inner.delete(blob).await
    }
}

/// Memory-backed key-value store that records writes and can misbehave the
/// way remote stores do.
#[derive(Default)]
pub struct ScriptedKvStore {
    pub inner: MemoryKvStore,
    fail_sets_after: Option<usize>,
    fail_list: bool,
    fail_deletes: bool,
    duplicate_lists: bool,
    phantom_key: Option<String>,
    get_delay: Option<Duration>,
    sets: AtomicUsize,
    gets: AtomicUsize,
    writes: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<String>>,
}

impl ScriptedKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `n` writes through, then fails every later one.
    pub fn failing_sets_after(n: usize) -> Self {
        Self {
            fail_sets_after: Some(n),
            ..Self::default()
        }
    }

    pub fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Self::default()
        }
    }

    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    /// Lists every key twice, in reverse the second time.
    pub fn duplicating_lists() -> Self {
        Self {
            duplicate_lists: true,
            ..Self::default()
        }
    }

    /// Lists an extra key (after the real ones) that has no value.
    pub fn with_phantom_key(key: &str) -> Self {
        Self {
            phantom_key: Some(key.to_string()),
            ..Self::default()
        }
    }

    /// Every read succeeds, but only after `delay`.
    pub fn slow_gets(delay: Duration) -> Self {
        Self {
            get_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Keys passed to `delete`, in order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl KvStore for ScriptedKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let value = self.inner.get(key).await;
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        value
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let n = self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_sets_after.is_some_and(|limit| n >= limit) {
            return Err(StoreError::Connection("write refused".to_string()));
        }
        self.inner.set(key, value).await?;
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.deleted.lock().unwrap().push(key.to_string());
        if self.fail_deletes {
            return Err(StoreError::Backend("delete refused".to_string()));
        }
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if self.fail_list {
            return Err(StoreError::Connection("scan refused".to_string()));
        }
        let mut keys = self.inner.list(prefix).await?;
        if self.duplicate_lists {
            let repeated: Vec<_> = keys.iter().rev().cloned().collect();
            keys.extend(repeated);
        }
        if let Some(phantom) = &self.phantom_key {
            keys.push(phantom.clone());
        }
        Ok(keys)
    }
}

/// Analysis service that answers with a fixed reply or error.
pub struct ScriptedAnalysis {
    reply: Result<AnalysisReply, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedAnalysis {
    pub fn replying(reply: AnalysisReply) -> Self {
        Self {
            reply: Ok(reply),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn analyze(
        &self,
        _document: &BlobRef,
        _instructions: &str,
    ) -> Result<AnalysisReply, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(|message| {
            AnalysisError::Llm(LlmError::Api {
                status: 503,
                message,
            })
        })
    }
}

/// Rasterizer that returns a fixed PNG payload.
#[derive(Default)]
pub struct StaticRasterizer {
    fail: bool,
}

impl StaticRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Rasterizer for StaticRasterizer {
    async fn convert(&self, document: &Document) -> Result<RasterImage, RasterizeError> {
        if self.fail {
            return Err(RasterizeError::MissingOutput);
        }
        Ok(RasterImage::png_for(
            document,
            Bytes::from_static(b"\x89PNG\r\n\x1a\npreview"),
        ))
    }
}

/// Concrete handles on every scripted collaborator, so tests can both inject
/// them and inspect them afterwards.
#[derive(Clone)]
pub struct TestStores {
    pub blobs: Arc<ScriptedBlobStore>,
    pub kv: Arc<ScriptedKvStore>,
    pub analysis: Arc<ScriptedAnalysis>,
    pub rasterizer: Arc<StaticRasterizer>,
}

impl TestStores {
    pub fn new(analysis: ScriptedAnalysis) -> Self {
        Self {
            blobs: Arc::new(ScriptedBlobStore::new()),
            kv: Arc::new(ScriptedKvStore::new()),
            analysis: Arc::new(analysis),
            rasterizer: Arc::new(StaticRasterizer::new()),
        }
    }

    pub fn stores(&self) -> ReviewStores {
        ReviewStores {
            blobs: self.blobs.clone(),
            kv: self.kv.clone(),
            analyzer: self.analysis.clone(),
            rasterizer: self.rasterizer.clone(),
        }
    }
}
