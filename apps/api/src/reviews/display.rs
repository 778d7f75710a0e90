//! Process-local preview handles.
//!
//! A `DisplayHandle` stands in for a fetched preview image and must be handed
//! back to the registry that issued it. Until then the image stays reachable
//! at the handle's URL; afterwards the URL answers 404.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

/// Owned, revocable handle to a registered preview. Not `Clone`: exactly one
/// owner is responsible for releasing it.
#[derive(Debug)]
pub struct DisplayHandle {
    id: Uuid,
    released: bool,
}

impl DisplayHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> String {
        format!("/api/v1/previews/{}", self.id())
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        if !self.released {
            warn!(handle = %self.id, "display handle dropped without release; preview leaked");
        }
    }
}

#[derive(Debug, Default)]
pub struct DisplayRegistry {
    live: RwLock<HashMap<Uuid, Bytes>>,
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Bytes>> {
        self.live.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Bytes>> {
        self.live.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, image: Bytes) -> DisplayHandle {
        let id = Uuid::new_v4();
        self.write().insert(id, image);
        DisplayHandle {
            id,
            released: false,
        }
    }

    /// Image bytes for a live handle id.
    pub fn fetch(&self, id: Uuid) -> Option<Bytes> {
        self.read().get(&id).cloned()
    }

    /// Revokes the handle. Returns whether it was still live.
    pub fn release(&self, mut handle: DisplayHandle) -> bool {
        handle.released = true;
        self.write().remove(&handle.id).is_some()
    }

    /// Revokes a batch of handles, returning how many were live.
    pub fn release_all(&self, handles: impl IntoIterator<Item = DisplayHandle>) -> usize {
        let mut live = self.write();
        let mut released = 0;
        for mut handle in handles {
            handle.released = true;
            if live.remove(&handle.id).is_some() {
                released += 1;
            }
        }
        released
    }

    pub fn live_count(&self) -> usize {
        self.read().len()
    }
}
