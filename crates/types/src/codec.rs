//! Centralized serialization and deserialization.
//!
//! Every persisted or wire shape in hive (node chunks, ops, summaries) goes
//! through these two functions, so the storage format is postcard everywhere
//! and codec failures carry a single error type.

use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

/// Error type for codec operations.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// Encoding failed.
    #[snafu(display("Encoding failed: {source}"))]
    Encode {
        /// The underlying postcard error.
        source: postcard::Error,
    },

    /// Decoding failed.
    ///
    /// Covers both malformed bytes and unrecognized enum tags, so an op with
    /// an unknown tag surfaces here rather than as a separate protocol error.
    #[snafu(display("Decoding failed: {source}"))]
    Decode {
        /// The underlying postcard error.
        source: postcard::Error,
    },
}

/// Encodes a value to bytes using postcard serialization.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|source| CodecError::Encode { source })
}

/// Decodes bytes to a value using postcard deserialization.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if deserialization fails.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|source| CodecError::Decode { source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{Handle, Op, TreeDelta};

    #[test]
    fn test_roundtrip_set_op() {
        let op = Op::Set { key: "doc/17".to_string(), value: Bytes::from_static(b"payload") };
        let bytes = encode(&op).expect("encode set op");
        let decoded: Op = decode(&bytes).expect("decode set op");
        assert_eq!(op, decoded);
    }

    #[test]
    fn test_roundtrip_flush_op() {
        let root = Handle::of(b"root chunk");
        let op = Op::Flush {
            update: TreeDelta {
                new_root: root,
                new_handles: vec![root, Handle::of(b"leaf chunk")],
                deleted_handles: vec![Handle::of(b"old root")],
            },
            ref_sequence_number: 50,
        };
        let bytes = encode(&op).expect("encode flush op");
        let decoded: Op = decode(&bytes).expect("decode flush op");
        assert_eq!(op, decoded);
    }

    #[test]
    fn test_decode_malformed_input() {
        let malformed = [0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<Op, _> = decode(&malformed);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn test_decode_unknown_op_tag() {
        // Variant indexes beyond the enum are a protocol violation and must
        // surface as a decode error, never as a silently ignored op.
        let bogus_tag = [0x09];
        let result: Result<Op, _> = decode(&bogus_tag);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_truncated_input() {
        let op = Op::Delete { key: "doc/17".to_string() };
        let bytes = encode(&op).expect("encode");
        let result: Result<Op, _> = decode(&bytes[..bytes.len() - 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_display() {
        let result: Result<Op, _> = decode(&[0xFF]);
        let err = result.expect_err("should fail");
        assert!(err.to_string().starts_with("Decoding failed:"));
    }
}
