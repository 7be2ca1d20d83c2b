//! Blob service for the hive collaborative partial map.
//!
//! Chunks (serialized B-tree nodes) are immutable blobs addressed by the
//! SHA-256 of their bytes. This crate provides the storage seam the tree
//! builds on:
//!
//! - [`BlobStore`]: the async put/get trait
//! - [`MemoryBlobStore`]: in-memory backend for tests and detached use
//! - [`ObjectBlobStore`]: backend over the `object_store` crate
//!   (S3/GCS/Azure/local filesystem via URL schemes)
//!
//! Blobs are immutable and shared: because a handle is the content hash,
//! re-uploading identical bytes is idempotent and handle equality implies
//! content equality.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod object;

use std::future::Future;

use bytes::Bytes;
use hive_types::Handle;

pub use error::{BlobError, Result};
pub use memory::MemoryBlobStore;
pub use object::ObjectBlobStore;

/// Async storage seam for immutable, content-addressed chunks.
///
/// Implementations derive the returned handle from the uploaded bytes, so a
/// `put` of bytes `b` always yields `Handle::of(&b)` and `get` of that handle
/// returns exactly `b`.
pub trait BlobStore: Send + Sync {
    /// Uploads a chunk and returns its content address.
    ///
    /// Uploading bytes that are already stored is a cheap no-op.
    fn put(&self, bytes: Bytes) -> impl Future<Output = Result<Handle>> + Send;

    /// Downloads the chunk addressed by `handle`.
    fn get(&self, handle: Handle) -> impl Future<Output = Result<Bytes>> + Send;
}

impl<T: BlobStore> BlobStore for std::sync::Arc<T> {
    fn put(&self, bytes: Bytes) -> impl Future<Output = Result<Handle>> + Send {
        (**self).put(bytes)
    }

    fn get(&self, handle: Handle) -> impl Future<Output = Result<Bytes>> + Send {
        (**self).get(handle)
    }
}
