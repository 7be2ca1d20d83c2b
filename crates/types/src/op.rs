//! Wire operations carried by the totally-ordered op stream.
//!
//! Every mutation a client issues travels as one of these ops through the
//! host's ordering service; every client applies the resulting stream in the
//! same server-assigned order. Values are carried as opaque encoded bytes;
//! the host serializer owns the payload format.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::handle::Handle;

/// Server-assigned sequence number of an applied op.
///
/// Signed so that mutations applied while detached (never sequenced by the
/// server) can carry [`DETACHED_SEQ`].
pub type SequenceNumber = i64;

/// Synthetic sequence number recorded for detached mutations.
pub const DETACHED_SEQ: SequenceNumber = -1;

/// The chunk-set delta produced by a flush.
///
/// Applying the delta to a tree swaps its root to `new_root` and reconciles
/// its handle multiset: `new_handles` are added, `deleted_handles` removed.
/// `new_root` is always a member of `new_handles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDelta {
    /// Handle of the freshly uploaded root chunk.
    pub new_root: Handle,
    /// Every chunk uploaded by this flush.
    pub new_handles: Vec<Handle>,
    /// Every previously persisted chunk structurally replaced by this flush.
    pub deleted_handles: Vec<Handle>,
}

/// A sequenced map operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Sets `key` to an encoded value.
    Set {
        /// The key being written.
        key: String,
        /// The host-encoded value payload.
        value: Bytes,
    },

    /// Deletes `key` if present.
    Delete {
        /// The key being deleted.
        key: String,
    },

    /// Removes every entry from the map.
    Clear,

    /// Adopts a compacted tree produced by the leader.
    ///
    /// `ref_sequence_number` is the sequence number of the last op already
    /// folded into the new tree; ops sequenced after it remain cached and are
    /// re-applied on top. Concurrent flushes from former leaders are filtered
    /// by comparing reference sequence numbers: only the highest takes
    /// effect.
    Flush {
        /// The chunk-set delta to apply.
        update: TreeDelta,
        /// Sequence number of the last op incorporated into the new tree.
        ref_sequence_number: SequenceNumber,
    },
}

impl Op {
    /// Returns the key this op targets, if it targets one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Op::Set { key, .. } | Op::Delete { key } => Some(key),
            Op::Clear | Op::Flush { .. } => None,
        }
    }
}
