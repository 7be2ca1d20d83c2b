//! Error types for chunked B-tree operations.

use hive_store::BlobError;
use hive_types::{CodecError, Handle};
use snafu::Snafu;

/// Result type alias for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur during chunked B-tree operations.
///
/// Storage and decode failures are surfaced without retry; the caller decides
/// whether to retry, abandon a flush, or bubble the error up. The tree itself
/// stays usable for keys that do not require the failing chunk.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TreeError {
    /// The tree was constructed with an order below two.
    #[snafu(display("Invalid tree order {order}: order must be >= 2"))]
    InvalidOrder {
        /// The rejected order.
        order: u32,
    },

    /// A chunk could not be uploaded or downloaded.
    #[snafu(display("Chunk storage unavailable: {source}"))]
    StorageUnavailable {
        /// The underlying blob store error.
        source: BlobError,
    },

    /// A chunk resolved to bytes that do not parse as a node.
    #[snafu(display("Corrupt node chunk {handle}: {source}"))]
    CorruptNode {
        /// The handle whose chunk failed to decode.
        handle: Handle,
        /// The underlying codec error.
        source: CodecError,
    },

    /// A node failed to serialize during upload.
    #[snafu(display("Failed to encode node chunk: {source}"))]
    ChunkEncode {
        /// The underlying codec error.
        source: CodecError,
    },

    /// A synchronous operation reached an unresolved chunk.
    ///
    /// Raised by the inline (no-upload) flush, which is only defined for
    /// fully resident trees.
    #[snafu(display("Tree has unloaded chunks; this operation requires a fully resident tree"))]
    NotResident,
}
