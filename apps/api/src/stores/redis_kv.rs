use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::debug;

use crate::stores::{KvStore, StoreError};

/// Key-value store backed by Redis string keys.
#[derive(Clone)]
pub struct RedisKvStore {
    client: Client,
}

impl RedisKvStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.connection().await?;
        con.get(key).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        con.set(key, value).await.map_err(backend)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        con.del(key).await.map_err(backend)
    }

    /// SCAN may yield a key more than once; callers deduplicate.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.connection().await?;
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> =
            con.scan_match(&pattern).await.map_err(backend)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        debug!("SCAN {pattern} returned {} keys", keys.len());
        Ok(keys)
    }
}
