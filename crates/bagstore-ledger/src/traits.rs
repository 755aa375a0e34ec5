use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bagstore_types::{
    AccountId, BagId, DataObject, DataObjectId, MemberId, StorageBucket, StorageBucketId,
    WorkerId, WorkingGroup,
};

use crate::error::LedgerResult;

/// Arguments of the ledger call that confirms uploaded data objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptPendingObjects {
    pub worker_id: WorkerId,
    pub storage_bucket_id: StorageBucketId,
    pub bag_id: BagId,
    pub data_object_ids: BTreeSet<DataObjectId>,
    /// Role account submitting the call on behalf of the worker.
    pub signer: AccountId,
}

/// Where a peer storage operator can be reached.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorEndpoint {
    pub bucket_id: StorageBucketId,
    pub worker_id: Option<WorkerId>,
    /// Base URL of the operator's public API, without a trailing slash.
    pub url: String,
}

/// Read and write boundary to the authoritative chain state.
///
/// Operations that exist once per working group take the group explicitly.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Controller account of a membership, `None` for unknown members.
    async fn member_controller(&self, member: MemberId) -> LedgerResult<Option<AccountId>>;

    /// Role account of a worker, `None` for unknown workers.
    async fn worker_role_account(
        &self,
        group: WorkingGroup,
        worker: WorkerId,
    ) -> LedgerResult<Option<AccountId>>;

    /// Buckets in `group` currently operated by `worker`.
    async fn operated_buckets(
        &self,
        group: WorkingGroup,
        worker: WorkerId,
    ) -> LedgerResult<Vec<StorageBucket>>;

    async fn storage_bucket(&self, id: StorageBucketId) -> LedgerResult<Option<StorageBucket>>;

    async fn data_object(&self, bag: &BagId, id: DataObjectId) -> LedgerResult<Option<DataObject>>;

    /// Mark pending data objects as accepted by the bucket. Objects that are
    /// already accepted are left as they are.
    async fn accept_pending_data_objects(
        &self,
        group: WorkingGroup,
        request: &AcceptPendingObjects,
    ) -> LedgerResult<()>;

    /// Runtime limit on a single data object's size, in bytes.
    async fn max_data_object_size(&self) -> LedgerResult<u64>;
}

/// Read-only view of indexed chain state.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Every data object registered in any of `bags`.
    async fn bag_objects(&self, bags: &[BagId]) -> LedgerResult<Vec<DataObject>>;

    /// Operators of the storage buckets that hold `bag`.
    async fn bag_operators(&self, bag: &BagId) -> LedgerResult<Vec<OperatorEndpoint>>;
}
