use bagstore_types::{AccountId, BagId, DataObjectId, StorageBucketId, WorkerId, WorkingGroup};

/// Errors produced by ledger and indexer operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("worker {worker} is not registered in the {group} working group")]
    UnknownWorker { group: WorkingGroup, worker: WorkerId },

    #[error("account {account} is not the role account of worker {worker}")]
    NotRoleAccount { worker: WorkerId, account: AccountId },

    #[error("storage bucket {0} does not exist")]
    UnknownBucket(StorageBucketId),

    #[error("worker {worker} does not operate storage bucket {bucket}")]
    NotBucketOperator {
        bucket: StorageBucketId,
        worker: WorkerId,
    },

    #[error("bag {bag} is not assigned to storage bucket {bucket}")]
    BagNotAssigned { bag: BagId, bucket: StorageBucketId },

    #[error("data object {id} is not registered in bag {bag}")]
    UnknownDataObject { bag: BagId, id: DataObjectId },

    #[error("data object {id} is {size} bytes, above the {max} byte limit")]
    ObjectTooLarge {
        id: DataObjectId,
        size: u64,
        max: u64,
    },

    #[error("no data objects given")]
    NoDataObjects,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected indexer response: {0}")]
    Indexer(String),

    #[error("invalid ledger snapshot: {0}")]
    Snapshot(String),
}

impl LedgerError {
    /// `true` when retrying the same call later may succeed without any
    /// change on the caller's side.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Indexer(_))
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
