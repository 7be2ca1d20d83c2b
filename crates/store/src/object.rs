//! Blob store over the `object_store` crate.

use std::sync::Arc;

use bytes::Bytes;
use hive_types::Handle;
use object_store::{ObjectStore, PutPayload, path::Path as ObjectPath};
use url::Url;

use crate::{BlobError, BlobStore, Result};

/// Chunk store backed by an `object_store` implementation (Warm storage).
///
/// Supports S3, GCS, Azure Blob Storage, and local filesystem via URL
/// schemes:
/// - `s3://bucket/prefix` - Amazon S3 (or compatible: MinIO, Wasabi, etc.)
/// - `gs://bucket/prefix` - Google Cloud Storage
/// - `az://container/prefix` - Azure Blob Storage
/// - `file:///path/to/dir` - Local filesystem (for testing/development)
///
/// Credentials are read from the environment the way the respective
/// `object_store` builders document (e.g. `AWS_ACCESS_KEY_ID` /
/// `AWS_SECRET_ACCESS_KEY` for S3-compatible services).
///
/// Chunks are stored under `<prefix>/chunks/<hex-handle>`. Every read is
/// verified against its content address before it is returned.
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    prefix: ObjectPath,
}

impl ObjectBlobStore {
    /// Creates a blob store from a URL.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::Unavailable`] if the URL does not parse or its
    /// scheme is not supported by the compiled-in backends.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| BlobError::Unavailable {
            message: format!("invalid blob store URL '{url}': {e}"),
        })?;
        let (store, prefix) = object_store::parse_url(&parsed).map_err(|e| {
            BlobError::Unavailable { message: format!("unsupported blob store URL '{url}': {e}") }
        })?;
        Ok(Self { store: Arc::from(store), prefix })
    }

    /// Creates a blob store over an existing `object_store` instance.
    ///
    /// Used by hosts that already hold a configured store, and by tests with
    /// `object_store::memory::InMemory`.
    pub fn with_store(store: Arc<dyn ObjectStore>, prefix: ObjectPath) -> Self {
        Self { store, prefix }
    }

    fn chunk_path(&self, handle: Handle) -> ObjectPath {
        self.prefix.child("chunks").child(handle.to_hex())
    }
}

impl BlobStore for ObjectBlobStore {
    async fn put(&self, bytes: Bytes) -> Result<Handle> {
        let handle = Handle::of(&bytes);
        let path = self.chunk_path(handle);
        self.store
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| BlobError::Unavailable { message: format!("put {path}: {e}") })?;
        Ok(handle)
    }

    async fn get(&self, handle: Handle) -> Result<Bytes> {
        let path = self.chunk_path(handle);
        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(BlobError::NotFound { handle });
            },
            Err(e) => {
                return Err(BlobError::Unavailable { message: format!("get {path}: {e}") });
            },
        };
        let bytes = result
            .bytes()
            .await
            .map_err(|e| BlobError::Unavailable { message: format!("read {path}: {e}") })?;
        if Handle::of(&bytes) != handle {
            return Err(BlobError::ContentMismatch { handle });
        }
        Ok(bytes)
    }
}
