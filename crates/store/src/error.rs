//! Error types for blob storage.

use hive_types::Handle;
use snafu::Snafu;

/// Result type alias for blob store operations.
pub type Result<T> = std::result::Result<T, BlobError>;

/// Errors that can occur while storing or retrieving chunks.
#[derive(Debug, Snafu)]
pub enum BlobError {
    /// No blob exists under the requested handle.
    #[snafu(display("Blob {handle} not found"))]
    NotFound {
        /// The missing handle.
        handle: Handle,
    },

    /// The storage backend failed or is unreachable.
    #[snafu(display("Blob storage unavailable: {message}"))]
    Unavailable {
        /// Description of the backend failure.
        message: String,
    },

    /// The retrieved bytes do not hash to the requested handle.
    ///
    /// Content addressing makes this detectable on every read; it indicates
    /// backend corruption or a misbehaving store.
    #[snafu(display("Blob {handle} content mismatch"))]
    ContentMismatch {
        /// The handle whose content failed verification.
        handle: Handle,
    },
}
