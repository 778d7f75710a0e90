use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use crate::models::resume::BlobRef;
use crate::stores::{object_path, BlobStore, StoreError};

/// Blob store backed by an S3 bucket (MinIO locally, AWS in production).
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(
        &self,
        file_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<BlobRef, StoreError> {
        let key = object_path(file_name);
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 upload failed: {e}")))?;

        info!("Uploaded {size} bytes to s3://{}/{}", self.bucket, key);
        Ok(BlobRef::new(key))
    }

    async fn read(&self, blob: &BlobRef) -> Result<Bytes, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(blob.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound(blob.to_string())
                } else {
                    StoreError::Backend(format!("S3 read failed: {e}"))
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Connection(format!("S3 body read failed: {e}")))?;
        Ok(body.into_bytes())
    }

    async fn delete(&self, blob: &BlobRef) -> Result<(), StoreError> {
        // S3 DeleteObject already succeeds for absent keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(blob.as_str())
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 delete failed: {e}")))?;

        debug!("Deleted s3://{}/{}", self.bucket, blob);
        Ok(())
    }
}
