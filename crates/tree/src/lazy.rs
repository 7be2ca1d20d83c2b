//! Handle-backed nodes with memoized resolution.

use std::sync::Arc;

use hive_store::BlobStore;
use hive_types::Handle;
use parking_lot::RwLock;
use snafu::ResultExt;

use crate::{
    error::{Result, StorageUnavailableSnafu, TreeError},
    node::{Node, NodeRecord},
};

/// A persisted node known by its chunk handle.
///
/// The first operation that visits the node downloads and decodes its chunk
/// and caches the result; eviction drops the cache and reverts the node to
/// handle-only form. The cache slot is the only interior mutability in the
/// tree.
#[derive(Debug)]
pub(crate) struct LazyNode {
    handle: Handle,
    resolved: RwLock<Option<Arc<Node>>>,
}

impl LazyNode {
    /// Creates an unresolved node for `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle, resolved: RwLock::new(None) }
    }

    /// The chunk handle this node persists as.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the cached resolution, if resident.
    pub fn cached(&self) -> Option<Arc<Node>> {
        self.resolved.read().clone()
    }

    /// Returns the node, downloading and decoding its chunk on first visit.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::StorageUnavailable`] if the chunk cannot be
    /// fetched and [`TreeError::CorruptNode`] if its bytes do not parse.
    pub async fn resolve<S: BlobStore>(&self, store: &S) -> Result<Arc<Node>> {
        if let Some(node) = self.cached() {
            return Ok(node);
        }
        let bytes = store.get(self.handle).await.context(StorageUnavailableSnafu)?;
        let record: NodeRecord = hive_types::decode(&bytes)
            .map_err(|source| TreeError::CorruptNode { handle: self.handle, source })?;
        let node = Arc::new(Node::from_record(record));
        let mut slot = self.resolved.write();
        // A concurrent resolution may have landed while the download was in
        // flight; keep whichever arrived first.
        Ok(Arc::clone(slot.get_or_insert(node)))
    }

    /// Drops the cached resolution, reverting to handle-only form.
    pub fn evict(&self) {
        *self.resolved.write() = None;
    }
}
