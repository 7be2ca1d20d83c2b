//! Chunked B-tree for the hive collaborative partial map.
//!
//! An immutable sorted map over string keys whose nodes are individually
//! persisted as content-addressed chunks in a blob store. The resident
//! working set stays small: unvisited subtrees are plain handles, resolved
//! on first access and evictable back to handle-only form.
//!
//! ## Structure
//!
//! - `node.rs`: leaf and interior node shapes, immutable edit primitives,
//!   the persisted chunk record
//! - `lazy.rs`: handle-backed nodes with memoized resolution
//! - `handles.rs`: the ordered chunk-handle multiset used for GC enumeration
//! - `tree.rs`: lookup, structural edits, flush, adoption of flush deltas,
//!   eviction
//!
//! Every edit returns a new tree value; unchanged subtrees are shared, so
//! reads against an older tree instance keep returning pre-edit values.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod handles;
mod lazy;
mod node;
mod tree;

pub use error::{Result, TreeError};
pub use tree::ChunkedBTree;
