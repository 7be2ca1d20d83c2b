//! Content addresses for persisted chunks.
//!
//! A handle is the SHA-256 of a chunk's bytes. Handle equality therefore
//! implies content equality, which is what makes chunk bookkeeping across
//! concurrent tree instances additive: two clients uploading the same node
//! produce the same handle.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a handle in bytes (SHA-256 output).
pub const HANDLE_LEN: usize = 32;

/// Opaque, comparable identifier for a persisted chunk.
///
/// The core never inspects handle contents; it creates handles by hashing
/// uploaded chunk bytes, resolves them back through a blob store, and compares
/// them for deduplicated bookkeeping. Ordering is the byte order of the
/// digest, which gives garbage-collection enumeration a stable order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle([u8; HANDLE_LEN]);

impl Handle {
    /// Computes the handle of a chunk from its serialized bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Reconstructs a handle from a raw digest.
    pub const fn from_bytes(bytes: [u8; HANDLE_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    pub const fn as_bytes(&self) -> &[u8; HANDLE_LEN] {
        &self.0
    }

    /// Returns the lowercase hex rendering, used for blob object names.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(HANDLE_LEN * 2);
        for byte in &self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex chars identify a chunk unambiguously in log output.
        write!(f, "Handle({})", &self.to_hex()[..8])
    }
}
