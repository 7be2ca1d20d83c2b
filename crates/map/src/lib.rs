//! The hive collaborative partial map.
//!
//! A distributed key/value container whose working set is kept small in
//! memory while the authoritative dataset lives as a content-addressed,
//! chunked B-tree in a blob store. Multiple clients apply edits concurrently
//! through a totally-ordered op stream; the elected leader periodically
//! compacts the outstanding op log into a new persisted tree that other
//! clients adopt lazily.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │               PartialMap controller             │
//! │   (get/has/set/delete/clear, op application,   │
//! │    flush scheduling, summaries, events)        │
//! └──────┬──────────────┬──────────────┬───────────┘
//!        │              │              │
//! ┌──────▼─────┐ ┌──────▼───────┐ ┌────▼──────────┐
//! │ Pending    │ │ Sequenced    │ │ ChunkedBTree  │
//! │ State      │ │ State        │ │ (hive-tree)   │
//! │ (unacked)  │ │ (acked ops)  │ │               │
//! └────────────┘ └──────────────┘ └────┬──────────┘
//!                                      │
//!                               ┌──────▼──────────┐
//!                               │   BlobStore     │
//!                               │  (hive-store)   │
//!                               └─────────────────┘
//! ```
//!
//! Reads probe pending, then sequenced, then the tree. Writes land in
//! pending optimistically and move into sequenced when the ordering service
//! acks them; the leader eventually folds sequenced changes into the tree
//! and every client swaps roots when the flush op comes back.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod controller;
mod error;
mod events;
mod leader;
mod pending;
mod sequenced;

pub use controller::{PartialMap, Runtime};
pub use error::{MapError, Result};
pub use events::MapEvent;
pub use leader::{LeaderChange, LeaderTracker};
pub use pending::PendingState;
pub use sequenced::SequencedState;

use bytes::Bytes;

/// Outcome of probing one state layer for a key.
///
/// `Hit` and `Absent` are authoritative answers from that layer; `Miss`
/// means the layer has no information and the next layer decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRead {
    /// The layer knows the key's current value.
    Hit(Bytes),
    /// The layer knows the key is absent (deleted or dominated by a clear).
    Absent,
    /// The layer has no information about the key.
    Miss,
}
