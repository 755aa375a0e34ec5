use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use bagstore_store::{BlobWriter, ContentStore};

use crate::error::{SyncError, SyncResult};
use crate::peers::PeerSelector;
use crate::transport::PeerTransport;
use crate::types::{SyncAction, SyncTask};

/// Counts from one batch of tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub fetched: usize,
    pub pruned: usize,
    pub failed: usize,
}

/// Runs sync tasks on a bounded pool.
///
/// Every task, fetch or prune, holds one permit of a shared semaphore, so at
/// most `workers` tasks touch the network or the disk at once. Each task is
/// capped by `task_timeout`; failures are counted and never abort siblings.
#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn ContentStore>,
    transport: Arc<dyn PeerTransport>,
    selector: Arc<dyn PeerSelector>,
    workers: usize,
    task_timeout: Duration,
}

impl Executor {
    pub fn new(
        store: Arc<dyn ContentStore>,
        transport: Arc<dyn PeerTransport>,
        selector: Arc<dyn PeerSelector>,
        workers: usize,
        task_timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            selector,
            workers: workers.max(1),
            task_timeout,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn PeerSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn run(&self, tasks: Vec<SyncTask>) -> ExecutionSummary {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();

        for task in tasks {
            let permits = Arc::clone(&permits);
            let this = self.clone();
            set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let action = task.action;
                let hash = task.content_hash;
                let result = match tokio::time::timeout(this.task_timeout, this.run_task(&task)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Timeout(this.task_timeout)),
                };
                if let Err(e) = &result {
                    warn!(action = ?action, hash = %hash.short_hex(), error = %e, "sync task failed");
                }
                (action, result.is_ok())
            });
        }

        let mut summary = ExecutionSummary::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((SyncAction::Fetch, true)) => summary.fetched += 1,
                Ok((SyncAction::Prune, true)) => summary.pruned += 1,
                Ok((_, false)) => summary.failed += 1,
                Err(e) => {
                    warn!(error = %e, "sync task aborted");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn run_task(&self, task: &SyncTask) -> SyncResult<()> {
        match task.action {
            SyncAction::Fetch => self.fetch(task).await,
            SyncAction::Prune => self.prune(task).await,
        }
    }

    /// Delete only if the blob was not re-published after planning; an
    /// upload of the same bytes in between must survive.
    async fn prune(&self, task: &SyncTask) -> SyncResult<()> {
        let hash = &task.content_hash;
        let deleted = match task.cutoff_ms {
            Some(cutoff_ms) => self.store.delete_if_older(hash, cutoff_ms).await?,
            None => self.store.delete(hash).await?,
        };
        if deleted {
            debug!(hash = %hash.short_hex(), "pruned blob");
        } else {
            debug!(hash = %hash.short_hex(), "blob gone or refreshed since planning, kept");
        }
        Ok(())
    }

    /// Try candidates in selector order until one serves the right bytes.
    /// Bytes stream into a staging writer and are only committed once their
    /// digest matches.
    async fn fetch(&self, task: &SyncTask) -> SyncResult<()> {
        let hash = &task.content_hash;
        if self.store.exists(hash).await? {
            return Ok(());
        }
        let candidates = self.selector.order(&task.source_candidates);
        if candidates.is_empty() {
            return Err(SyncError::NoCandidates(*hash));
        }
        let limit = task.size.unwrap_or(u64::MAX);

        for peer in &candidates {
            let mut writer = self.store.begin_write().await?;
            if let Err(e) = self.transport.fetch(peer, hash, limit, writer.as_mut()).await {
                debug!(peer = %peer.url, error = %e, "peer fetch failed, trying next");
                discard(writer).await;
                continue;
            }
            let computed = writer.digest();
            if computed != *hash {
                warn!(
                    peer = %peer.url,
                    expected = %hash.short_hex(),
                    computed = %computed.short_hex(),
                    "peer served corrupt bytes, discarded"
                );
                discard(writer).await;
                continue;
            }
            let blob = writer.commit().await?;
            debug!(hash = %hash.short_hex(), size = blob.size, peer = %peer.url, "fetched blob");
            return Ok(());
        }
        Err(SyncError::AllCandidatesFailed {
            hash: *hash,
            attempts: candidates.len(),
        })
    }
}

async fn discard(writer: Box<dyn BlobWriter>) {
    if let Err(e) = writer.abort().await {
        warn!(error = %e, "could not discard staged fetch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::SequentialPeerSelector;
    use crate::testing::{peer, MockTransport};
    use bagstore_store::InMemoryContentStore;
    use bagstore_types::{AcceptanceState, BagId, ContentHash, DataObject, DataObjectId, ManualClock};

    fn fetch_task(id: u64, content: &[u8], urls: &[&str]) -> SyncTask {
        let mut object = DataObject::pending(
            DataObjectId(id),
            BagId::COUNCIL,
            ContentHash::from_bytes(content),
            content.len() as u64,
        );
        object.state = AcceptanceState::Accepted;
        let candidates = urls
            .iter()
            .enumerate()
            .map(|(i, url)| peer(i as u64, url))
            .collect();
        SyncTask::fetch(&object, candidates)
    }

    fn executor(
        store: &InMemoryContentStore,
        transport: &Arc<MockTransport>,
        workers: usize,
        task_timeout: Duration,
    ) -> Executor {
        Executor::new(
            Arc::new(store.clone()),
            transport.clone(),
            Arc::new(SequentialPeerSelector),
            workers,
            task_timeout,
        )
    }

    #[tokio::test]
    async fn fetch_stores_verified_bytes() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::default());
        let hash = transport.serve("http://a", b"object bytes");

        let summary = executor(&store, &transport, 4, Duration::from_secs(5))
            .run(vec![fetch_task(1, b"object bytes", &["http://a"])])
            .await;
        assert_eq!(summary.fetched, 1);
        assert_eq!(&store.get(&hash).await.unwrap().unwrap()[..], b"object bytes");
    }

    #[tokio::test]
    async fn corrupt_bytes_are_never_committed() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::default());
        let expected = ContentHash::from_bytes(b"genuine");
        transport.serve_as("http://evil", expected, b"forged");

        let summary = executor(&store, &transport, 4, Duration::from_secs(5))
            .run(vec![fetch_task(1, b"genuine", &["http://evil"])])
            .await;
        assert_eq!(summary, ExecutionSummary { failed: 1, ..Default::default() });
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn oversized_body_is_refused_and_next_peer_tried() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::default());
        let expected = ContentHash::from_bytes(b"genuine");
        transport.serve_as("http://flood", expected, &[0u8; 4096]);
        transport.serve("http://good", b"genuine");

        let summary = executor(&store, &transport, 4, Duration::from_secs(5))
            .run(vec![fetch_task(1, b"genuine", &["http://flood", "http://good"])])
            .await;
        assert_eq!(summary.fetched, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.total_bytes().await, 7);
    }

    #[tokio::test]
    async fn falls_back_to_next_candidate() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::default());
        let expected = ContentHash::from_bytes(b"genuine");
        transport.serve_as("http://evil", expected, b"forged");
        transport.serve("http://good", b"genuine");

        let summary = executor(&store, &transport, 4, Duration::from_secs(5))
            .run(vec![fetch_task(
                1,
                b"genuine",
                &["http://evil", "http://missing", "http://good"],
            )])
            .await;
        assert_eq!(summary.fetched, 1);
        assert_eq!(transport.calls(), 3);
        assert!(store.exists(&expected).await.unwrap());
    }

    #[tokio::test]
    async fn no_candidates_is_a_failure() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::default());
        let summary = executor(&store, &transport, 4, Duration::from_secs(5))
            .run(vec![fetch_task(1, b"x", &[])])
            .await;
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn held_blob_is_not_refetched() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::default());
        store.put(b"already here").await.unwrap();
        let summary = executor(&store, &transport, 4, Duration::from_secs(5))
            .run(vec![fetch_task(1, b"already here", &["http://a"])])
            .await;
        assert_eq!(summary.fetched, 1);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn prune_deletes_blob() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::default());
        let blob = store.put(b"stale").await.unwrap();
        let summary = executor(&store, &transport, 4, Duration::from_secs(5))
            .run(vec![SyncTask::prune(blob.hash, u64::MAX)])
            .await;
        assert_eq!(summary.pruned, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn prune_keeps_blob_rewritten_after_cutoff() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = InMemoryContentStore::with_clock(clock.clone());
        let transport = Arc::new(MockTransport::default());
        let blob = store.put(b"re-uploaded").await.unwrap();
        let task = SyncTask::prune(blob.hash, 1_000_000);

        clock.advance(Duration::from_secs(5));
        store.put(b"re-uploaded").await.unwrap();

        let summary = executor(&store, &transport, 4, Duration::from_secs(5))
            .run(vec![task])
            .await;
        assert_eq!(summary.failed, 0);
        assert!(store.exists(&blob.hash).await.unwrap());
    }

    #[tokio::test]
    async fn in_flight_fetches_never_exceed_pool_width() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::with_delay(Duration::from_millis(20)));
        let tasks: Vec<SyncTask> = (0..12u64)
            .map(|i| {
                let content = format!("object {i}");
                transport.serve("http://a", content.as_bytes());
                fetch_task(i, content.as_bytes(), &["http://a"])
            })
            .collect();

        let summary = executor(&store, &transport, 3, Duration::from_secs(5))
            .run(tasks)
            .await;
        assert_eq!(summary.fetched, 12);
        assert!(transport.max_in_flight() <= 3);
        assert!(transport.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn timed_out_task_does_not_block_others() {
        let store = InMemoryContentStore::new();
        let transport = Arc::new(MockTransport::default());
        transport.hang("http://stuck");
        let stuck = ContentHash::from_bytes(b"never arrives");
        let fine = transport.serve("http://ok", b"arrives");

        let summary = executor(&store, &transport, 2, Duration::from_millis(100))
            .run(vec![
                fetch_task(1, b"never arrives", &["http://stuck"]),
                fetch_task(2, b"arrives", &["http://ok"]),
            ])
            .await;
        assert_eq!(summary, ExecutionSummary { fetched: 1, pruned: 0, failed: 1 });
        assert!(store.exists(&fine).await.unwrap());
        assert!(!store.exists(&stuck).await.unwrap());
    }
}
