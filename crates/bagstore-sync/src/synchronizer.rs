use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use bagstore_ledger::{Indexer, LedgerGateway, OperatorEndpoint};
use bagstore_store::ContentStore;
use bagstore_types::{
    AcceptanceState, BagId, Clock, ContentHash, DataObject, StorageBucketId, SystemClock,
    WorkerId, WorkingGroup,
};

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::executor::Executor;
use crate::peers::{PeerSelector, RandomPeerSelector};
use crate::planner::Planner;
use crate::scheduler::Ticker;
use crate::transport::PeerTransport;
use crate::types::{PassReport, SyncState, SyncTask};

/// Reconciles the local store against the node's bucket assignments.
///
/// Passes are serialized: the loop and any direct [`Synchronizer::run_pass`]
/// caller share one lock, so at most one pass is in flight.
pub struct Synchronizer {
    worker: WorkerId,
    ledger: Arc<dyn LedgerGateway>,
    indexer: Arc<dyn Indexer>,
    store: Arc<dyn ContentStore>,
    executor: Executor,
    clock: Arc<dyn Clock>,
    prune_grace: Duration,
    pass_lock: Mutex<()>,
    state_tx: watch::Sender<SyncState>,
    report_tx: watch::Sender<Option<PassReport>>,
}

impl Synchronizer {
    pub fn new(
        worker: WorkerId,
        config: &SyncConfig,
        ledger: Arc<dyn LedgerGateway>,
        indexer: Arc<dyn Indexer>,
        store: Arc<dyn ContentStore>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        let executor = Executor::new(
            Arc::clone(&store),
            transport,
            Arc::new(RandomPeerSelector),
            config.worker_count(),
            config.task_timeout(),
        );
        let (state_tx, _) = watch::channel(SyncState::Idle);
        let (report_tx, _) = watch::channel(None);
        Self {
            worker,
            ledger,
            indexer,
            store,
            executor,
            clock: Arc::new(SystemClock),
            prune_grace: config.prune_grace(),
            pass_lock: Mutex::new(()),
            state_tx,
            report_tx,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_peer_selector(mut self, selector: Arc<dyn PeerSelector>) -> Self {
        self.executor = self.executor.with_selector(selector);
        self
    }

    pub fn state(&self) -> SyncState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    pub fn last_report(&self) -> Option<PassReport> {
        self.report_tx.borrow().clone()
    }

    /// Receives every finished pass report, failed passes included.
    pub fn subscribe_reports(&self) -> watch::Receiver<Option<PassReport>> {
        self.report_tx.subscribe()
    }

    fn set_state(&self, state: SyncState) {
        self.state_tx.send_replace(state);
    }

    /// Compute this pass's tasks without executing them.
    pub async fn plan(&self) -> SyncResult<Vec<SyncTask>> {
        let buckets = self
            .ledger
            .operated_buckets(WorkingGroup::Storage, self.worker)
            .await?;
        let own: HashSet<StorageBucketId> = buckets.iter().map(|b| b.id).collect();
        let bags: Vec<BagId> = buckets
            .iter()
            .flat_map(|b| b.assigned_bags.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let desired = if bags.is_empty() {
            Vec::new()
        } else {
            self.indexer.bag_objects(&bags).await?
        };
        let held = self.store.list().await?;

        let held_hashes: HashSet<ContentHash> = held.iter().map(|b| b.hash).collect();
        let fetches = Planner::compute_fetches(&desired, &held_hashes);
        let mut peers: BTreeMap<BagId, Vec<OperatorEndpoint>> = BTreeMap::new();
        for bag in Planner::bags_needing_peers(&fetches) {
            let remote = match self.indexer.bag_operators(&bag).await {
                Ok(operators) => operators
                    .into_iter()
                    .filter(|op| !own.contains(&op.bucket_id))
                    .collect(),
                Err(e) => {
                    warn!(bag = %bag, error = %e, "operator lookup failed, bag gets no candidates");
                    Vec::new()
                }
            };
            peers.insert(bag, remote);
        }

        let tasks = Planner::plan(&desired, &held, &peers, self.clock.now_ms(), self.prune_grace);
        info!(
            buckets = buckets.len(),
            bags = bags.len(),
            desired = desired.len(),
            held = held.len(),
            tasks = tasks.len(),
            "sync plan computed"
        );
        Ok(tasks)
    }

    /// One Planning + Executing round. A planning failure abandons the pass
    /// before any task runs, so nothing is pruned against partial data.
    pub async fn run_pass(&self) -> SyncResult<PassReport> {
        let _pass = self.pass_lock.lock().await;
        let started_at_ms = self.clock.now_ms();

        self.set_state(SyncState::Planning);
        let tasks = match self.plan().await {
            Ok(tasks) => tasks,
            Err(e) => {
                self.set_state(SyncState::Idle);
                self.report_tx.send_replace(Some(PassReport {
                    started_at_ms,
                    finished_at_ms: self.clock.now_ms(),
                    error: Some(e.to_string()),
                    ..Default::default()
                }));
                return Err(e);
            }
        };

        self.set_state(SyncState::Executing);
        let planned = tasks.len();
        let summary = self.executor.run(tasks).await;
        self.set_state(SyncState::Idle);

        let report = PassReport {
            planned,
            fetched: summary.fetched,
            pruned: summary.pruned,
            failed: summary.failed,
            started_at_ms,
            finished_at_ms: self.clock.now_ms(),
            error: None,
        };
        self.report_tx.send_replace(Some(report.clone()));
        Ok(report)
    }

    /// Run passes whenever `ticker` fires until `shutdown` flips to `true`
    /// or the ticker ends. A failing pass is logged and the loop carries on.
    pub async fn run<T: Ticker>(&self, mut ticker: T, mut shutdown: watch::Receiver<bool>) {
        info!(worker = %self.worker, workers = self.executor.workers(), "synchronizer started");
        loop {
            self.set_state(SyncState::Sleeping);
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                ticked = ticker.tick() => {
                    if !ticked {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            // Dropping the pass aborts its in-flight tasks.
            let outcome = tokio::select! {
                outcome = self.run_pass() => outcome,
                _ = shutdown.wait_for(|stop| *stop) => {
                    warn!("shutdown during sync pass, abandoning in-flight tasks");
                    break;
                }
            };
            match outcome {
                Ok(report) if report.failed > 0 => warn!(
                    planned = report.planned,
                    fetched = report.fetched,
                    pruned = report.pruned,
                    failed = report.failed,
                    "sync pass finished with failures, retrying next pass"
                ),
                Ok(report) => info!(
                    planned = report.planned,
                    fetched = report.fetched,
                    pruned = report.pruned,
                    "sync pass finished"
                ),
                Err(e) => error!(error = %e, "sync pass failed"),
            }
        }
        self.set_state(SyncState::Stopped);
        info!("synchronizer stopped");
    }

    /// Local view of `object`: its ledger state if the blob is held,
    /// otherwise [`AcceptanceState::Absent`].
    pub async fn local_state(&self, object: &DataObject) -> SyncResult<AcceptanceState> {
        let held = self.store.exists(&object.content_hash).await?;
        Ok(object.local_state(held))
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("worker", &self.worker)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
