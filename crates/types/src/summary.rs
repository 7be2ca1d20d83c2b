//! Summary shapes for attach and snapshot exchange.
//!
//! A summary captures a map's authoritative tree as a single postcard blob
//! stored under the well-known identifier [`SUMMARY_BLOB_ID`]. Maps that are
//! empty or tiny at attach time inline their entire content as one leaf so no
//! chunk upload is needed; established maps reference their persisted root by
//! handle and enumerate the chunk handles reachable from it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::handle::Handle;

/// Well-known blob identifier the summary is stored under.
pub const SUMMARY_BLOB_ID: &str = "hive";

/// A whole map packed into one unserialized leaf.
///
/// Parallel `keys`/`values` sequences sorted by key, exactly the shape of a
/// persisted leaf chunk minus the upload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InlineLeaf {
    /// Sorted keys.
    pub keys: Vec<String>,
    /// Encoded values, parallel to `keys`.
    pub values: Vec<Bytes>,
}

impl InlineLeaf {
    /// Number of entries in the leaf.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the leaf holds no entries.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The root of a summarized tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryRoot {
    /// Root persisted as a chunk; the tree hydrates lazily from the handle.
    Handle(Handle),
    /// Root inlined into the summary itself (attach-time small maps).
    Inline(InlineLeaf),
}

/// A complete map summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// B-tree order the summarized tree was built with.
    pub order: u32,
    /// The tree root, by handle or inlined.
    pub root: SummaryRoot,
    /// Every chunk handle reachable from `root`, each occurrence, in handle
    /// order. Empty for inline roots.
    pub handles: Vec<Handle>,
}
