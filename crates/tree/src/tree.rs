//! The chunked B-tree: lookup, structural edits, flush, delta adoption,
//! eviction.

use std::collections::{BTreeMap, HashMap, HashSet};

use bytes::Bytes;
use futures::future::BoxFuture;
use hive_store::BlobStore;
use hive_types::{Handle, InlineLeaf, Summary, SummaryRoot, TreeDelta};
use snafu::ResultExt;

use crate::{
    error::{ChunkEncodeSnafu, Result, StorageUnavailableSnafu, TreeError},
    handles::HandleSet,
    node::{Interior, Leaf, Link, Node, NodeRecord},
};

/// An immutable B-tree over sorted string keys whose nodes persist as
/// content-addressed chunks.
///
/// Every structural edit returns a new tree sharing unchanged subtrees with
/// the receiver. Persisted subtrees load lazily on first visit and can be
/// evicted back to handle-only form, so the resident working set tracks what
/// has actually been read, not the size of the map.
#[derive(Debug, Clone)]
pub struct ChunkedBTree {
    order: usize,
    root: Link,
    handles: HandleSet,
}

impl ChunkedBTree {
    /// Creates an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidOrder`] if `order < 2`.
    pub fn new(order: u32) -> Result<Self> {
        if order < 2 {
            return Err(TreeError::InvalidOrder { order });
        }
        Ok(Self {
            order: order as usize,
            root: Link::loaded(Node::Leaf(Leaf::default())),
            handles: HandleSet::default(),
        })
    }

    /// Hydrates a tree from a summary: lazily for handle roots, fully
    /// resident for inline roots.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidOrder`] if the summary's order is below
    /// two.
    pub fn from_summary(summary: &Summary) -> Result<Self> {
        if summary.order < 2 {
            return Err(TreeError::InvalidOrder { order: summary.order });
        }
        let root = match &summary.root {
            SummaryRoot::Handle(handle) => Link::lazy(*handle),
            SummaryRoot::Inline(leaf) => Link::loaded(Node::Leaf(Leaf {
                keys: leaf.keys.clone(),
                values: leaf.values.clone(),
            })),
        };
        Ok(Self {
            order: summary.order as usize,
            root,
            handles: summary.handles.iter().copied().collect(),
        })
    }

    /// Captures the tree as a summary: by root handle when persisted, as an
    /// inline leaf when fully resident.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotResident`] if the root is in memory but some
    /// descendant chunk is not (no persisted root to reference, no resident
    /// content to inline).
    pub fn to_summary(&self) -> Result<Summary> {
        let root = match &self.root {
            Link::Lazy(lazy) => SummaryRoot::Handle(lazy.handle()),
            Link::Loaded(_) => SummaryRoot::Inline(self.collect_inline()?),
        };
        Ok(Summary { order: self.order as u32, root, handles: self.all_handles().collect() })
    }

    /// The configured order.
    pub fn order(&self) -> u32 {
        self.order as u32
    }

    /// Looks up `key`, resolving chunks as needed.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::StorageUnavailable`] or
    /// [`TreeError::CorruptNode`] if a required chunk cannot be resolved;
    /// keys that do not require the failing chunk remain readable.
    pub async fn get<S: BlobStore>(&self, key: &str, store: &S) -> Result<Option<Bytes>> {
        get_link(self.root.clone(), key, store).await
    }

    /// Whether `key` is present, resolving chunks as needed.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`get`](Self::get).
    pub async fn has<S: BlobStore>(&self, key: &str, store: &S) -> Result<bool> {
        Ok(self.get(key, store).await?.is_some())
    }

    /// Returns a tree containing `key -> value`.
    ///
    /// Every persisted node on the edited path is structurally replaced; its
    /// handle is pushed onto `deleted_handles`. Freshly built nodes have no
    /// handle and contribute nothing.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`get`](Self::get).
    pub async fn set<S: BlobStore>(
        &self,
        key: &str,
        value: Bytes,
        store: &S,
        deleted_handles: &mut Vec<Handle>,
    ) -> Result<Self> {
        match set_link(self.root.clone(), self.order, key, value, store, deleted_handles).await? {
            SetOutcome::Replaced(root) => Ok(self.with_root(root)),
            SetOutcome::Split { left, separator, right } => {
                let root = Link::loaded(Node::Interior(Interior {
                    keys: vec![separator],
                    children: vec![left, right],
                }));
                Ok(self.with_root(root))
            },
        }
    }

    /// Returns a tree without `key`.
    ///
    /// Deleting an absent key returns the receiver unchanged and records
    /// nothing. No merging or rebalancing is performed; an emptied leaf is
    /// dropped from its parent.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`get`](Self::get).
    pub async fn delete<S: BlobStore>(
        &self,
        key: &str,
        store: &S,
        deleted_handles: &mut Vec<Handle>,
    ) -> Result<Self> {
        match delete_link(self.root.clone(), key, store, deleted_handles).await? {
            DeleteOutcome::Unchanged => Ok(self.clone()),
            DeleteOutcome::Replaced(root) => Ok(self.with_root(root)),
            DeleteOutcome::Removed => {
                Ok(self.with_root(Link::loaded(Node::Leaf(Leaf::default()))))
            },
        }
    }

    /// Applies a batch of updates and deletes, uploads every structurally
    /// new chunk, and returns the chunk-set delta.
    ///
    /// The batch is applied in unspecified order: each key appears at most
    /// once across `updates` and `deletes`, so the net effect is
    /// order-independent. Persisted subtrees that were never loaded re-emit
    /// their existing handle without re-upload. The receiver is unchanged;
    /// the new tree is adopted by [`update`](Self::update) once the flush op
    /// comes back sequenced.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::StorageUnavailable`] if a chunk upload or
    /// download fails; no local state has changed when it does.
    pub async fn flush<S: BlobStore>(
        &self,
        updates: &HashMap<String, Bytes>,
        deletes: &HashSet<String>,
        store: &S,
    ) -> Result<TreeDelta> {
        let mut deleted_handles = Vec::new();
        let mut tree = self.clone();
        for (key, value) in updates {
            tree = tree.set(key, value.clone(), store, &mut deleted_handles).await?;
        }
        for key in deletes {
            tree = tree.delete(key, store, &mut deleted_handles).await?;
        }

        let mut new_handles = Vec::new();
        let new_root = upload_link(tree.root.clone(), store, &mut new_handles).await?;
        tracing::debug!(
            uploaded = new_handles.len(),
            replaced = deleted_handles.len(),
            "flushed tree to chunk store"
        );
        Ok(TreeDelta { new_root, new_handles, deleted_handles })
    }

    /// Applies a batch of updates and deletes into a single inline leaf
    /// without uploading anything.
    ///
    /// Used at attach time, when the map is guaranteed small and nothing has
    /// been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotResident`] if any chunk of the receiver is
    /// not resident in memory.
    pub fn flush_sync(
        &self,
        updates: &HashMap<String, Bytes>,
        deletes: &HashSet<String>,
    ) -> Result<InlineLeaf> {
        let mut entries = BTreeMap::new();
        collect_resident(&self.root, &mut entries)?;
        for (key, value) in updates {
            entries.insert(key.clone(), value.clone());
        }
        for key in deletes {
            entries.remove(key);
        }
        let (keys, values) = entries.into_iter().unzip();
        Ok(InlineLeaf { keys, values })
    }

    /// Adopts a flush delta: the root becomes a lazy reference to the new
    /// root chunk and the handle multiset is reconciled.
    pub fn update(&self, delta: &TreeDelta) -> Self {
        let mut handles = self.handles.clone();
        for handle in &delta.new_handles {
            handles.insert(*handle);
        }
        for handle in &delta.deleted_handles {
            handles.remove(*handle);
        }
        Self { order: self.order, root: Link::lazy(delta.new_root), handles }
    }

    /// Returns an empty tree of the same order.
    pub fn clear(&self) -> Self {
        Self {
            order: self.order,
            root: Link::loaded(Node::Leaf(Leaf::default())),
            handles: HandleSet::default(),
        }
    }

    /// Drops cached chunk resolutions until roughly `count_hint` resident
    /// keys have been released.
    ///
    /// Post-order: a lazy node's cache is dropped only when its resolved
    /// subtree holds no un-evictable content (freshly built nodes that exist
    /// nowhere else). Evicted subtrees re-resolve from their handles on the
    /// next visit.
    pub fn evict(&self, count_hint: usize) {
        let mut remaining = count_hint;
        evict_link(&self.root, &mut remaining);
    }

    /// Total key count resident in memory. Keys behind unresolved chunks
    /// contribute nothing.
    pub fn working_set_size(&self) -> usize {
        working_set(&self.root)
    }

    /// Enumerates every chunk handle reachable from the root, each
    /// occurrence, in handle order. These are the map's GC roots.
    pub fn all_handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.handles.iter()
    }

    fn with_root(&self, root: Link) -> Self {
        Self { order: self.order, root, handles: self.handles.clone() }
    }

    fn collect_inline(&self) -> Result<InlineLeaf> {
        let mut entries = BTreeMap::new();
        collect_resident(&self.root, &mut entries)?;
        let (keys, values) = entries.into_iter().unzip();
        Ok(InlineLeaf { keys, values })
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &Link {
        &self.root
    }
}

/// Result of an immutable insert below some node.
enum SetOutcome {
    /// The child was rebuilt in place.
    Replaced(Link),
    /// The child split; the separator is the minimum key of `right`.
    Split { left: Link, separator: String, right: Link },
}

/// Result of an immutable delete below some node.
enum DeleteOutcome {
    /// The key was absent; nothing changed.
    Unchanged,
    /// The child was rebuilt without the key.
    Replaced(Link),
    /// The child became empty and should be dropped by its parent.
    Removed,
}

fn get_link<'a, S: BlobStore>(
    link: Link,
    key: &'a str,
    store: &'a S,
) -> BoxFuture<'a, Result<Option<Bytes>>> {
    Box::pin(async move {
        let node = link.node(store).await?;
        match &*node {
            Node::Leaf(leaf) => Ok(leaf.get(key).cloned()),
            Node::Interior(interior) => {
                let child = interior.children[interior.child_index(key)].clone();
                get_link(child, key, store).await
            },
        }
    })
}

fn set_link<'a, S: BlobStore>(
    link: Link,
    order: usize,
    key: &'a str,
    value: Bytes,
    store: &'a S,
    deleted: &'a mut Vec<Handle>,
) -> BoxFuture<'a, Result<SetOutcome>> {
    Box::pin(async move {
        let node = link.node(store).await?;
        // An insert always rebuilds the visited path, so a persisted node
        // here is always structurally replaced.
        if let Link::Lazy(lazy) = &link {
            deleted.push(lazy.handle());
        }
        match &*node {
            Node::Leaf(leaf) => {
                let replacement = leaf.with_set(key, value);
                if replacement.len() >= order {
                    let (left, separator, right) = replacement.split();
                    Ok(SetOutcome::Split {
                        left: Link::loaded(Node::Leaf(left)),
                        separator,
                        right: Link::loaded(Node::Leaf(right)),
                    })
                } else {
                    Ok(SetOutcome::Replaced(Link::loaded(Node::Leaf(replacement))))
                }
            },
            Node::Interior(interior) => {
                let idx = interior.child_index(key);
                let child = interior.children[idx].clone();
                match set_link(child, order, key, value, store, &mut *deleted).await? {
                    SetOutcome::Replaced(new_child) => Ok(SetOutcome::Replaced(Link::loaded(
                        Node::Interior(interior.with_child_replaced(idx, new_child)),
                    ))),
                    SetOutcome::Split { left, separator, right } => {
                        let widened = interior.with_split_child(idx, left, separator, right);
                        if widened.keys.len() >= order {
                            let (left, separator, right) = widened.split();
                            Ok(SetOutcome::Split {
                                left: Link::loaded(Node::Interior(left)),
                                separator,
                                right: Link::loaded(Node::Interior(right)),
                            })
                        } else {
                            Ok(SetOutcome::Replaced(Link::loaded(Node::Interior(widened))))
                        }
                    },
                }
            },
        }
    })
}

fn delete_link<'a, S: BlobStore>(
    link: Link,
    key: &'a str,
    store: &'a S,
    deleted: &'a mut Vec<Handle>,
) -> BoxFuture<'a, Result<DeleteOutcome>> {
    Box::pin(async move {
        let node = link.node(store).await?;
        let outcome = match &*node {
            Node::Leaf(leaf) => match leaf.with_removed(key) {
                None => DeleteOutcome::Unchanged,
                Some(rest) if rest.is_empty() => DeleteOutcome::Removed,
                Some(rest) => DeleteOutcome::Replaced(Link::loaded(Node::Leaf(rest))),
            },
            Node::Interior(interior) => {
                let idx = interior.child_index(key);
                let child = interior.children[idx].clone();
                match delete_link(child, key, store, &mut *deleted).await? {
                    DeleteOutcome::Unchanged => DeleteOutcome::Unchanged,
                    DeleteOutcome::Replaced(new_child) => DeleteOutcome::Replaced(Link::loaded(
                        Node::Interior(interior.with_child_replaced(idx, new_child)),
                    )),
                    DeleteOutcome::Removed => {
                        let trimmed = interior.with_child_removed(idx);
                        if trimmed.children.is_empty() {
                            DeleteOutcome::Removed
                        } else {
                            DeleteOutcome::Replaced(Link::loaded(Node::Interior(trimmed)))
                        }
                    },
                }
            },
        };
        // Only a delete that actually removed something replaces this node.
        if !matches!(outcome, DeleteOutcome::Unchanged) {
            if let Link::Lazy(lazy) = &link {
                deleted.push(lazy.handle());
            }
        }
        Ok(outcome)
    })
}

/// Uploads every freshly built node below `link`, children first, and
/// returns the chunk handle for `link` itself. Lazy links re-emit their
/// existing handle.
fn upload_link<'a, S: BlobStore>(
    link: Link,
    store: &'a S,
    new_handles: &'a mut Vec<Handle>,
) -> BoxFuture<'a, Result<Handle>> {
    Box::pin(async move {
        match link {
            Link::Lazy(lazy) => Ok(lazy.handle()),
            Link::Loaded(node) => {
                let record = match &*node {
                    Node::Leaf(leaf) => {
                        NodeRecord::Leaf { keys: leaf.keys.clone(), values: leaf.values.clone() }
                    },
                    Node::Interior(interior) => {
                        let mut children = Vec::with_capacity(interior.children.len());
                        for child in &interior.children {
                            children.push(upload_link(child.clone(), store, &mut *new_handles).await?);
                        }
                        NodeRecord::Interior { keys: interior.keys.clone(), children }
                    },
                };
                let bytes =
                    Bytes::from(hive_types::encode(&record).context(ChunkEncodeSnafu)?);
                let handle = store.put(bytes).await.context(StorageUnavailableSnafu)?;
                new_handles.push(handle);
                Ok(handle)
            },
        }
    })
}

fn collect_resident(link: &Link, entries: &mut BTreeMap<String, Bytes>) -> Result<()> {
    let node = link.resident().ok_or(TreeError::NotResident)?;
    match &*node {
        Node::Leaf(leaf) => {
            for (key, value) in leaf.keys.iter().zip(&leaf.values) {
                entries.insert(key.clone(), value.clone());
            }
        },
        Node::Interior(interior) => {
            for child in &interior.children {
                collect_resident(child, entries)?;
            }
        },
    }
    Ok(())
}

/// Returns true when the subtree holds no resident content after the call.
fn evict_link(link: &Link, remaining: &mut usize) -> bool {
    match link {
        Link::Loaded(node) => {
            // Freshly built nodes cannot be evicted (they exist nowhere
            // else), but persisted descendants below them still can.
            if let Node::Interior(interior) = &**node {
                for child in &interior.children {
                    evict_link(child, remaining);
                }
            }
            false
        },
        Link::Lazy(lazy) => {
            let Some(node) = lazy.cached() else { return true };
            match &*node {
                Node::Leaf(leaf) => {
                    if *remaining == 0 {
                        return false;
                    }
                    *remaining = remaining.saturating_sub(leaf.len());
                    drop(node);
                    lazy.evict();
                    true
                },
                Node::Interior(interior) => {
                    let mut subtree_clear = true;
                    for child in &interior.children {
                        subtree_clear &= evict_link(child, remaining);
                    }
                    if subtree_clear && *remaining > 0 {
                        drop(node);
                        lazy.evict();
                        true
                    } else {
                        false
                    }
                },
            }
        },
    }
}

fn working_set(link: &Link) -> usize {
    let Some(node) = link.resident() else { return 0 };
    match &*node {
        Node::Leaf(leaf) => leaf.len(),
        Node::Interior(interior) => interior.children.iter().map(working_set).sum(),
    }
}
