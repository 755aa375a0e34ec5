use async_trait::async_trait;
use bytes::Bytes;

use bagstore_types::ContentHash;

use crate::error::StoreResult;

/// Metadata for a blob held in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobInfo {
    pub hash: ContentHash,
    pub size: u64,
    /// Last modification time, milliseconds since the UNIX epoch.
    pub modified_ms: u64,
}

/// Outcome of a committed write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommittedBlob {
    pub hash: ContentHash,
    pub size: u64,
}

/// An in-progress write into the store.
///
/// Bytes are hashed as they are written. Nothing is visible under a content
/// address until [`BlobWriter::commit`] succeeds, and commit publishes the
/// blob under the hash of exactly the bytes that were written.
#[async_trait]
pub trait BlobWriter: Send {
    /// Append the next chunk.
    async fn write(&mut self, chunk: &[u8]) -> StoreResult<()>;

    /// Bytes written so far.
    fn written(&self) -> u64;

    /// Hash of the bytes written so far. Lets a caller check content
    /// against an expected hash before anything is published.
    fn digest(&self) -> ContentHash;

    /// Publish the blob under its content hash. Publishing bytes that are
    /// already stored is a no-op overwrite.
    async fn commit(self: Box<Self>) -> StoreResult<CommittedBlob>;

    /// Discard everything written so far.
    async fn abort(self: Box<Self>) -> StoreResult<()>;
}

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - A blob's name is the hash of its bytes; names are never chosen by callers.
/// - Partially written data is never visible under a final name.
/// - Concurrent writes of identical bytes converge to one blob.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Start a streaming write.
    async fn begin_write(&self) -> StoreResult<Box<dyn BlobWriter>>;

    /// Read a blob. Returns `Ok(None)` if it is not held.
    async fn get(&self, hash: &ContentHash) -> StoreResult<Option<Bytes>>;

    /// Check whether a blob is held.
    async fn exists(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Delete a blob. Returns `true` if it existed.
    async fn delete(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Delete a blob only if it was last modified at or before `cutoff_ms`.
    /// The check and the removal are one step with respect to commits, so a
    /// blob re-published after the cutoff is kept. Returns `true` if it was
    /// deleted.
    async fn delete_if_older(&self, hash: &ContentHash, cutoff_ms: u64) -> StoreResult<bool>;

    /// Every blob currently held.
    async fn list(&self) -> StoreResult<Vec<BlobInfo>>;

    /// Write a complete buffer in one go.
    async fn put(&self, data: &[u8]) -> StoreResult<CommittedBlob> {
        let mut writer = self.begin_write().await?;
        writer.write(data).await?;
        writer.commit().await
    }
}
