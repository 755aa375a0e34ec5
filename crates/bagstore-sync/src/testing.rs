//! Scripted peer transport shared by the sync tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use bagstore_ledger::OperatorEndpoint;
use bagstore_store::BlobWriter;
use bagstore_types::{ContentHash, StorageBucketId};

use crate::error::{SyncError, SyncResult};
use crate::transport::PeerTransport;

pub(crate) fn peer(bucket: u64, url: &str) -> OperatorEndpoint {
    OperatorEndpoint {
        bucket_id: StorageBucketId(bucket),
        worker_id: None,
        url: url.to_string(),
    }
}

#[derive(Default)]
pub(crate) struct MockTransport {
    blobs: Mutex<HashMap<(String, ContentHash), Bytes>>,
    hanging: Mutex<HashSet<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Serve `data` from `url` under its real hash.
    pub(crate) fn serve(&self, url: &str, data: &[u8]) -> ContentHash {
        let hash = ContentHash::from_bytes(data);
        self.serve_as(url, hash, data);
        hash
    }

    /// Serve `data` from `url` under an arbitrary hash.
    pub(crate) fn serve_as(&self, url: &str, hash: ContentHash, data: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert((url.to_string(), hash), Bytes::copy_from_slice(data));
    }

    /// Requests to `url` never complete.
    pub(crate) fn hang(&self, url: &str) {
        self.hanging.lock().unwrap().insert(url.to_string());
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn fetch(
        &self,
        peer: &OperatorEndpoint,
        hash: &ContentHash,
        limit: u64,
        writer: &mut dyn BlobWriter,
    ) -> SyncResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let hangs = self.hanging.lock().unwrap().contains(&peer.url);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let found = self
            .blobs
            .lock()
            .unwrap()
            .get(&(peer.url.clone(), *hash))
            .cloned();
        let data = found.ok_or_else(|| SyncError::PeerMissing {
            url: peer.url.clone(),
            hash: *hash,
        })?;
        if data.len() as u64 > limit {
            return Err(SyncError::Oversized {
                url: peer.url.clone(),
                limit,
            });
        }
        writer.write(&data).await?;
        Ok(data.len() as u64)
    }
}
