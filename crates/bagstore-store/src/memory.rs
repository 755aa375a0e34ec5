use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use bagstore_crypto::{ContentHasher, StreamingHasher};
use bagstore_types::{Clock, ContentHash, SystemClock};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobInfo, BlobWriter, CommittedBlob, ContentStore};

#[derive(Clone)]
struct Entry {
    data: Bytes,
    modified_ms: u64,
}

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. Modification times come from the
/// injected [`Clock`], which lets prune-grace behaviour be tested without
/// sleeping.
#[derive(Clone)]
pub struct InMemoryContentStore {
    blobs: Arc<RwLock<HashMap<ContentHash, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of blobs currently stored.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Total bytes across all stored blobs.
    pub async fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .await
            .values()
            .map(|e| e.data.len() as u64)
            .sum()
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn begin_write(&self) -> StoreResult<Box<dyn BlobWriter>> {
        Ok(Box::new(MemoryBlobWriter {
            buf: Some(Vec::new()),
            hasher: ContentHasher::streaming(),
            store: self.clone(),
        }))
    }

    async fn get(&self, hash: &ContentHash) -> StoreResult<Option<Bytes>> {
        Ok(self.blobs.read().await.get(hash).map(|e| e.data.clone()))
    }

    async fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.blobs.read().await.contains_key(hash))
    }

    async fn delete(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.blobs.write().await.remove(hash).is_some())
    }

    async fn delete_if_older(&self, hash: &ContentHash, cutoff_ms: u64) -> StoreResult<bool> {
        let mut map = self.blobs.write().await;
        match map.get(hash) {
            Some(entry) if entry.modified_ms <= cutoff_ms => {
                map.remove(hash);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self) -> StoreResult<Vec<BlobInfo>> {
        let map = self.blobs.read().await;
        let mut blobs: Vec<BlobInfo> = map
            .iter()
            .map(|(hash, e)| BlobInfo {
                hash: *hash,
                size: e.data.len() as u64,
                modified_ms: e.modified_ms,
            })
            .collect();
        blobs.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(blobs)
    }
}

struct MemoryBlobWriter {
    buf: Option<Vec<u8>>,
    hasher: StreamingHasher,
    store: InMemoryContentStore,
}

#[async_trait]
impl BlobWriter for MemoryBlobWriter {
    async fn write(&mut self, chunk: &[u8]) -> StoreResult<()> {
        let buf = self.buf.as_mut().ok_or(StoreError::WriterClosed)?;
        buf.extend_from_slice(chunk);
        self.hasher.update(chunk);
        Ok(())
    }

    fn written(&self) -> u64 {
        self.hasher.len()
    }

    fn digest(&self) -> ContentHash {
        self.hasher.finalize().0
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<CommittedBlob> {
        let buf = self.buf.take().ok_or(StoreError::WriterClosed)?;
        let (hash, size) = self.hasher.finalize();
        let entry = Entry {
            data: Bytes::from(buf),
            modified_ms: self.store.clock.now_ms(),
        };
        self.store.blobs.write().await.insert(hash, entry);
        Ok(CommittedBlob { hash, size })
    }

    async fn abort(mut self: Box<Self>) -> StoreResult<()> {
        self.buf = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bagstore_types::ManualClock;
    use std::time::Duration;

    #[tokio::test]
    async fn write_and_read() {
        let store = InMemoryContentStore::new();
        let blob = store.put(b"hello world").await.unwrap();
        assert_eq!(blob.hash, ContentHash::from_bytes(b"hello world"));
        let data = store.get(&blob.hash).await.unwrap().expect("should exist");
        assert_eq!(&data[..], b"hello world");
    }

    #[tokio::test]
    async fn same_content_is_stored_once() {
        let store = InMemoryContentStore::new();
        store.put(b"identical").await.unwrap();
        store.put(b"identical").await.unwrap();
        store.put(b"different").await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.total_bytes().await, 18);
    }

    #[tokio::test]
    async fn aborted_write_leaves_nothing() {
        let store = InMemoryContentStore::new();
        let mut writer = store.begin_write().await.unwrap();
        writer.write(b"half").await.unwrap();
        writer.abort().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_present_and_missing() {
        let store = InMemoryContentStore::new();
        let blob = store.put(b"to-delete").await.unwrap();
        assert!(store.delete(&blob.hash).await.unwrap());
        assert!(!store.exists(&blob.hash).await.unwrap());
        assert!(!store.delete(&blob.hash).await.unwrap());
    }

    #[tokio::test]
    async fn list_uses_injected_clock() {
        let clock = Arc::new(ManualClock::new(5_000));
        let store = InMemoryContentStore::with_clock(clock.clone());
        let a = store.put(b"a").await.unwrap();
        clock.advance(Duration::from_secs(1));
        let b = store.put(b"b").await.unwrap();

        let listed = store.list().await.unwrap();
        let stamp = |h: ContentHash| listed.iter().find(|i| i.hash == h).unwrap().modified_ms;
        assert_eq!(stamp(a.hash), 5_000);
        assert_eq!(stamp(b.hash), 6_000);
        for w in listed.windows(2) {
            assert!(w[0].hash <= w[1].hash);
        }
    }

    #[tokio::test]
    async fn republished_blob_survives_conditional_delete() {
        let clock = Arc::new(ManualClock::new(5_000));
        let store = InMemoryContentStore::with_clock(clock.clone());
        let blob = store.put(b"old bytes").await.unwrap();

        clock.advance(Duration::from_secs(10));
        store.put(b"old bytes").await.unwrap();
        assert!(!store.delete_if_older(&blob.hash, 5_000).await.unwrap());
        assert!(store.exists(&blob.hash).await.unwrap());

        assert!(store.delete_if_older(&blob.hash, 15_000).await.unwrap());
        assert!(!store.exists(&blob.hash).await.unwrap());
        assert!(!store.delete_if_older(&blob.hash, 15_000).await.unwrap());
    }

    #[tokio::test]
    async fn clones_share_contents() {
        let store = InMemoryContentStore::new();
        let other = store.clone();
        let blob = store.put(b"shared").await.unwrap();
        assert!(other.exists(&blob.hash).await.unwrap());
    }
}
