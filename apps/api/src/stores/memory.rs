use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::models::resume::BlobRef;
use crate::stores::{object_path, BlobStore, KvStore, StoreError};

/// Process-local blob store for `STORAGE_BACKEND=memory` and tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        file_name: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<BlobRef, StoreError> {
        let path = object_path(file_name);
        self.objects.write().await.insert(path.clone(), bytes);
        Ok(BlobRef::new(path))
    }

    async fn read(&self, blob: &BlobRef) -> Result<Bytes, StoreError> {
        self.objects
            .read()
            .await
            .get(blob.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(blob.to_string()))
    }

    async fn delete(&self, blob: &BlobRef) -> Result<(), StoreError> {
        self.objects.write().await.remove(blob.as_str());
        Ok(())
    }
}

/// Process-local key-value store. Listing returns keys in sorted order.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
