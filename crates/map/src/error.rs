//! Error types for partial map operations.

use hive_tree::TreeError;
use hive_types::{CodecError, KeyError};
use snafu::Snafu;

/// Result type alias for partial map operations.
pub type Result<T> = std::result::Result<T, MapError>;

/// Errors surfaced by the partial map controller.
///
/// Local reads and writes never fail due to remote state; the failure modes
/// here are boundary validation, chunk storage, and summary codec problems.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MapError {
    /// A key was rejected at the boundary. No state changed.
    #[snafu(display("{source}"))]
    InvalidKey {
        /// The underlying key validation error.
        source: KeyError,
    },

    /// A tree operation failed (chunk storage unavailable or corrupt chunk).
    #[snafu(display("Tree operation failed: {source}"))]
    Tree {
        /// The underlying tree error.
        source: TreeError,
    },

    /// A summary failed to encode or decode.
    #[snafu(display("Summary codec error: {source}"))]
    Codec {
        /// The underlying codec error.
        source: CodecError,
    },
}
