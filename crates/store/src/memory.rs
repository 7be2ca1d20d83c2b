//! In-memory blob store for testing and detached maps.

use std::collections::HashMap;

use bytes::Bytes;
use hive_types::Handle;
use parking_lot::RwLock;

use crate::{BlobError, BlobStore, Result};

/// In-memory blob store.
///
/// All chunks live in a process-local map and are lost on drop. An
/// availability switch lets tests exercise the storage-unavailable paths
/// without a real backend.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<Handle, Bytes>>,
    unavailable: RwLock<bool>,
}

impl MemoryBlobStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether the store holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Whether a chunk exists under `handle`.
    pub fn contains(&self, handle: Handle) -> bool {
        self.blobs.read().contains_key(&handle)
    }

    /// Makes every subsequent operation fail with
    /// [`BlobError::Unavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    fn check_available(&self) -> Result<()> {
        if *self.unavailable.read() {
            return Err(BlobError::Unavailable { message: "backend offline".to_string() });
        }
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Bytes) -> Result<Handle> {
        self.check_available()?;
        let handle = Handle::of(&bytes);
        self.blobs.write().insert(handle, bytes);
        Ok(handle)
    }

    async fn get(&self, handle: Handle) -> Result<Bytes> {
        self.check_available()?;
        self.blobs.read().get(&handle).cloned().ok_or(BlobError::NotFound { handle })
    }
}
