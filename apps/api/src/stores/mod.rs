//! Remote store adapters: blob storage and the key-value record namespace.
//!
//! Every call is independently fallible and nothing spans more than one call.

pub mod memory;
pub mod redis_kv;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::models::resume::BlobRef;

pub use self::memory::{MemoryBlobStore, MemoryKvStore};
pub use self::redis_kv::RedisKvStore;
pub use self::s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Path-addressed file storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` and returns the path the store chose for them.
    async fn upload(
        &self,
        file_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<BlobRef, StoreError>;

    async fn read(&self, blob: &BlobRef) -> Result<Bytes, StoreError>;

    /// Idempotent: deleting a missing blob succeeds.
    async fn delete(&self, blob: &BlobRef) -> Result<(), StoreError>;
}

/// Flat string namespace with prefix listing.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrites any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Idempotent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Keys starting with `prefix`. May contain repeats and has no ordering guarantee.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Builds a unique object path that keeps the caller's file name readable.
pub(crate) fn object_path(file_name: &str) -> String {
    let cleaned: String = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    let name = if cleaned.is_empty() { "upload" } else { cleaned };
    format!("uploads/{}/{}", uuid::Uuid::new_v4(), name)
}
