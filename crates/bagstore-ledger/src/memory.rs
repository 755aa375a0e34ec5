use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, info};

use bagstore_types::{
    AcceptanceState, AccountId, BagId, DataObject, DataObjectId, MemberId, StorageBucket,
    StorageBucketId, WorkerId, WorkingGroup,
};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::{AcceptPendingObjects, Indexer, LedgerGateway, OperatorEndpoint};

/// Object size limit used when none is configured: 1 GiB.
pub const DEFAULT_MAX_DATA_OBJECT_SIZE: u64 = 1 << 30;

/// In-memory chain state for tests, local development, and embedding.
///
/// Implements both [`LedgerGateway`] and [`Indexer`] over the same state, so
/// an accepted upload is immediately visible to the synchronizer.
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
    max_data_object_size: AtomicU64,
    offline: AtomicBool,
    accept_calls: AtomicU64,
}

#[derive(Default)]
struct LedgerState {
    members: HashMap<MemberId, AccountId>,
    workers: HashMap<(WorkingGroup, WorkerId), AccountId>,
    buckets: BTreeMap<StorageBucketId, BucketEntry>,
    endpoints: HashMap<StorageBucketId, String>,
    objects: BTreeMap<(BagId, DataObjectId), DataObject>,
}

struct BucketEntry {
    group: WorkingGroup,
    bucket: StorageBucket,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
            max_data_object_size: AtomicU64::new(DEFAULT_MAX_DATA_OBJECT_SIZE),
            offline: AtomicBool::new(false),
            accept_calls: AtomicU64::new(0),
        }
    }

    fn state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self) -> LedgerResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("in-memory ledger is offline".into()));
        }
        Ok(())
    }

    pub fn set_max_data_object_size(&self, bytes: u64) {
        self.max_data_object_size.store(bytes, Ordering::SeqCst);
    }

    /// Make every subsequent call fail with [`LedgerError::Unavailable`]
    /// until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful `accept_pending_data_objects` calls.
    pub fn accept_calls(&self) -> u64 {
        self.accept_calls.load(Ordering::SeqCst)
    }

    /// Register a member or rotate its controller account.
    pub fn set_member_controller(&self, member: MemberId, controller: AccountId) {
        self.state_mut().members.insert(member, controller);
    }

    pub fn add_worker(&self, group: WorkingGroup, worker: WorkerId, role_account: AccountId) {
        self.state_mut().workers.insert((group, worker), role_account);
    }

    /// Create or replace a bucket in `group`.
    pub fn add_bucket(&self, group: WorkingGroup, bucket: StorageBucket) {
        self.state_mut()
            .buckets
            .insert(bucket.id, BucketEntry { group, bucket });
    }

    /// Public API base URL of the operator running `bucket`.
    pub fn set_bucket_endpoint(&self, bucket: StorageBucketId, url: impl Into<String>) {
        let url = url.into().trim_end_matches('/').to_string();
        self.state_mut().endpoints.insert(bucket, url);
    }

    pub fn assign_bag(&self, bucket: StorageBucketId, bag: BagId) -> LedgerResult<()> {
        self.with_bucket(bucket, |b| {
            b.assigned_bags.insert(bag);
        })
    }

    pub fn unassign_bag(&self, bucket: StorageBucketId, bag: &BagId) -> LedgerResult<()> {
        self.with_bucket(bucket, |b| {
            b.assigned_bags.remove(bag);
        })
    }

    pub fn set_accepting_new_data(&self, bucket: StorageBucketId, accepting: bool) -> LedgerResult<()> {
        self.with_bucket(bucket, |b| b.accepting_new_data = accepting)
    }

    fn with_bucket(
        &self,
        id: StorageBucketId,
        f: impl FnOnce(&mut StorageBucket),
    ) -> LedgerResult<()> {
        let mut state = self.state_mut();
        let entry = state.buckets.get_mut(&id).ok_or(LedgerError::UnknownBucket(id))?;
        f(&mut entry.bucket);
        Ok(())
    }

    /// Create or replace a data object.
    pub fn register_object(&self, object: DataObject) {
        self.state_mut()
            .objects
            .insert((object.bag_id, object.id), object);
    }

    /// Delete a data object. Returns `true` if it existed.
    pub fn remove_object(&self, bag: &BagId, id: DataObjectId) -> bool {
        self.state_mut().objects.remove(&(*bag, id)).is_some()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("InMemoryLedger")
            .field("members", &state.members.len())
            .field("buckets", &state.buckets.len())
            .field("objects", &state.objects.len())
            .finish()
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn member_controller(&self, member: MemberId) -> LedgerResult<Option<AccountId>> {
        self.ensure_online()?;
        Ok(self.state().members.get(&member).copied())
    }

    async fn worker_role_account(
        &self,
        group: WorkingGroup,
        worker: WorkerId,
    ) -> LedgerResult<Option<AccountId>> {
        self.ensure_online()?;
        Ok(self.state().workers.get(&(group, worker)).copied())
    }

    async fn operated_buckets(
        &self,
        group: WorkingGroup,
        worker: WorkerId,
    ) -> LedgerResult<Vec<StorageBucket>> {
        self.ensure_online()?;
        Ok(self
            .state()
            .buckets
            .values()
            .filter(|e| e.group == group && e.bucket.is_operated_by(worker))
            .map(|e| e.bucket.clone())
            .collect())
    }

    async fn storage_bucket(&self, id: StorageBucketId) -> LedgerResult<Option<StorageBucket>> {
        self.ensure_online()?;
        Ok(self.state().buckets.get(&id).map(|e| e.bucket.clone()))
    }

    async fn data_object(&self, bag: &BagId, id: DataObjectId) -> LedgerResult<Option<DataObject>> {
        self.ensure_online()?;
        Ok(self.state().objects.get(&(*bag, id)).cloned())
    }

    async fn accept_pending_data_objects(
        &self,
        group: WorkingGroup,
        request: &AcceptPendingObjects,
    ) -> LedgerResult<()> {
        self.ensure_online()?;
        if request.data_object_ids.is_empty() {
            return Err(LedgerError::NoDataObjects);
        }
        let max = self.max_data_object_size.load(Ordering::SeqCst);
        let mut state = self.state_mut();

        let role = state
            .workers
            .get(&(group, request.worker_id))
            .ok_or(LedgerError::UnknownWorker {
                group,
                worker: request.worker_id,
            })?;
        if *role != request.signer {
            return Err(LedgerError::NotRoleAccount {
                worker: request.worker_id,
                account: request.signer,
            });
        }

        let bucket = state
            .buckets
            .get(&request.storage_bucket_id)
            .filter(|e| e.group == group)
            .map(|e| &e.bucket)
            .ok_or(LedgerError::UnknownBucket(request.storage_bucket_id))?;
        if !bucket.is_operated_by(request.worker_id) {
            return Err(LedgerError::NotBucketOperator {
                bucket: bucket.id,
                worker: request.worker_id,
            });
        }
        if !bucket.stores(&request.bag_id) {
            return Err(LedgerError::BagNotAssigned {
                bag: request.bag_id,
                bucket: bucket.id,
            });
        }

        // All-or-nothing: validate every object before touching any.
        for id in &request.data_object_ids {
            let object = state
                .objects
                .get(&(request.bag_id, *id))
                .ok_or(LedgerError::UnknownDataObject {
                    bag: request.bag_id,
                    id: *id,
                })?;
            if object.size > max {
                return Err(LedgerError::ObjectTooLarge {
                    id: *id,
                    size: object.size,
                    max,
                });
            }
        }

        for id in &request.data_object_ids {
            if let Some(object) = state.objects.get_mut(&(request.bag_id, *id)) {
                if object.state != AcceptanceState::Accepted {
                    object.state = AcceptanceState::Accepted;
                    debug!(object = %id, bag = %request.bag_id, "data object accepted");
                }
            }
        }
        drop(state);

        self.accept_calls.fetch_add(1, Ordering::SeqCst);
        info!(
            bucket = %request.storage_bucket_id,
            bag = %request.bag_id,
            count = request.data_object_ids.len(),
            "pending data objects accepted"
        );
        Ok(())
    }

    async fn max_data_object_size(&self) -> LedgerResult<u64> {
        self.ensure_online()?;
        Ok(self.max_data_object_size.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl Indexer for InMemoryLedger {
    async fn bag_objects(&self, bags: &[BagId]) -> LedgerResult<Vec<DataObject>> {
        self.ensure_online()?;
        let state = self.state();
        Ok(state
            .objects
            .values()
            .filter(|o| bags.contains(&o.bag_id))
            .cloned()
            .collect())
    }

    async fn bag_operators(&self, bag: &BagId) -> LedgerResult<Vec<OperatorEndpoint>> {
        self.ensure_online()?;
        let state = self.state();
        Ok(state
            .buckets
            .values()
            .filter(|e| e.group == WorkingGroup::Storage && e.bucket.stores(bag))
            .filter_map(|e| {
                state.endpoints.get(&e.bucket.id).map(|url| OperatorEndpoint {
                    bucket_id: e.bucket.id,
                    worker_id: e.bucket.operator,
                    url: url.clone(),
                })
            })
            .collect())
    }
}
