//! Leaf and interior node shapes and their immutable edit primitives.
//!
//! Nodes are never mutated: every edit builds a replacement, and unchanged
//! children are shared through their `Arc`. Split points follow the classic
//! midpoint rule: a leaf splits at `ceil(order/2)` entries with the first
//! key of the right half as separator; an interior node promotes the middle
//! key of its overfull key list.

use std::sync::Arc;

use bytes::Bytes;
use hive_store::BlobStore;
use hive_types::Handle;
use serde::{Deserialize, Serialize};

use crate::{error::Result, lazy::LazyNode};

/// A reference to a child node: either a resolved in-memory node (freshly
/// built, not yet persisted) or a handle-backed lazy node.
#[derive(Debug, Clone)]
pub(crate) enum Link {
    /// Persisted chunk, resolved on demand.
    Lazy(Arc<LazyNode>),
    /// In-memory node with no persisted counterpart yet.
    Loaded(Arc<Node>),
}

impl Link {
    /// Wraps a freshly built node.
    pub fn loaded(node: Node) -> Self {
        Link::Loaded(Arc::new(node))
    }

    /// Wraps a persisted chunk handle.
    pub fn lazy(handle: Handle) -> Self {
        Link::Lazy(Arc::new(LazyNode::new(handle)))
    }

    /// Returns the node, resolving the chunk if necessary.
    pub async fn node<S: BlobStore>(&self, store: &S) -> Result<Arc<Node>> {
        match self {
            Link::Loaded(node) => Ok(Arc::clone(node)),
            Link::Lazy(lazy) => lazy.resolve(store).await,
        }
    }

    /// Returns the node only if it is resident in memory.
    pub fn resident(&self) -> Option<Arc<Node>> {
        match self {
            Link::Loaded(node) => Some(Arc::clone(node)),
            Link::Lazy(lazy) => lazy.cached(),
        }
    }
}

/// A B-tree node, tagged by shape.
#[derive(Debug)]
pub(crate) enum Node {
    /// Sorted keys with parallel values.
    Leaf(Leaf),
    /// Separator keys with child links; `keys[i]` is the minimum key of
    /// `children[i + 1]`.
    Interior(Interior),
}

impl Node {
    /// Rebuilds a node from its persisted record.
    pub fn from_record(record: NodeRecord) -> Self {
        match record {
            NodeRecord::Leaf { keys, values } => Node::Leaf(Leaf { keys, values }),
            NodeRecord::Interior { keys, children } => Node::Interior(Interior {
                keys,
                children: children.into_iter().map(Link::lazy).collect(),
            }),
        }
    }
}

/// The persisted chunk format, one blob per node.
///
/// Interior children are stored as handles only; serializing a node requires
/// its children to have been uploaded first.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum NodeRecord {
    /// Leaf chunk: sorted keys and parallel encoded values.
    Leaf {
        /// Sorted keys.
        keys: Vec<String>,
        /// Encoded values, parallel to `keys`.
        values: Vec<Bytes>,
    },
    /// Interior chunk: separator keys and child chunk handles.
    Interior {
        /// Separator keys, one fewer than children.
        keys: Vec<String>,
        /// Child chunk handles.
        children: Vec<Handle>,
    },
}

/// Leaf node: parallel `keys`/`values` sequences sorted by key.
#[derive(Debug, Default, Clone)]
pub(crate) struct Leaf {
    pub keys: Vec<String>,
    pub values: Vec<Bytes>,
}

impl Leaf {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Looks up `key` by binary search.
    pub fn get(&self, key: &str) -> Option<&Bytes> {
        match self.keys.binary_search_by(|k| k.as_str().cmp(key)) {
            Ok(idx) => Some(&self.values[idx]),
            Err(_) => None,
        }
    }

    /// Returns a leaf with `key` set to `value`: splice-inserted when new,
    /// replaced in place when already present.
    pub fn with_set(&self, key: &str, value: Bytes) -> Leaf {
        let mut leaf = self.clone();
        match leaf.keys.binary_search_by(|k| k.as_str().cmp(key)) {
            Ok(idx) => leaf.values[idx] = value,
            Err(idx) => {
                leaf.keys.insert(idx, key.to_string());
                leaf.values.insert(idx, value);
            },
        }
        leaf
    }

    /// Returns a leaf with `key` removed, or `None` if the key is absent.
    pub fn with_removed(&self, key: &str) -> Option<Leaf> {
        match self.keys.binary_search_by(|k| k.as_str().cmp(key)) {
            Ok(idx) => {
                let mut leaf = self.clone();
                leaf.keys.remove(idx);
                leaf.values.remove(idx);
                Some(leaf)
            },
            Err(_) => None,
        }
    }

    /// Splits a full leaf: the left half keeps `ceil(len / 2)` entries, the
    /// separator is the first key of the right half.
    pub fn split(mut self) -> (Leaf, String, Leaf) {
        let left_len = self.len().div_ceil(2);
        let right = Leaf { keys: self.keys.split_off(left_len), values: self.values.split_off(left_len) };
        let separator = right.keys[0].clone();
        (self, separator, right)
    }
}

/// Interior node: separator keys and child links.
#[derive(Debug, Clone)]
pub(crate) struct Interior {
    pub keys: Vec<String>,
    pub children: Vec<Link>,
}

impl Interior {
    /// Index of the child whose key range contains `key`: the first child
    /// `i` with `key < keys[i]`, or the last child when no separator is
    /// greater.
    pub fn child_index(&self, key: &str) -> usize {
        self.keys.partition_point(|k| k.as_str() <= key)
    }

    /// Returns an interior node with the child at `idx` swapped out.
    pub fn with_child_replaced(&self, idx: usize, child: Link) -> Interior {
        let mut interior = self.clone();
        interior.children[idx] = child;
        interior
    }

    /// Returns an interior node with the child at `idx` replaced by a split
    /// pair and `separator` spliced in between.
    pub fn with_split_child(&self, idx: usize, left: Link, separator: String, right: Link) -> Interior {
        let mut interior = self.clone();
        interior.keys.insert(idx, separator);
        interior.children[idx] = left;
        interior.children.insert(idx + 1, right);
        interior
    }

    /// Returns an interior node with the child at `idx` and its adjoining
    /// separator removed.
    pub fn with_child_removed(&self, idx: usize) -> Interior {
        let mut interior = self.clone();
        interior.children.remove(idx);
        // A single-child interior carries no separators.
        if !interior.keys.is_empty() {
            interior.keys.remove(idx.saturating_sub(1));
        }
        interior
    }

    /// Splits a full interior node by promoting the middle separator.
    pub fn split(mut self) -> (Interior, String, Interior) {
        let mid = self.keys.len() / 2;
        let right_keys = self.keys.split_off(mid + 1);
        let separator = self.keys.pop().unwrap_or_default();
        let right_children = self.children.split_off(mid + 1);
        let right = Interior { keys: right_keys, children: right_children };
        (self, separator, right)
    }
}
