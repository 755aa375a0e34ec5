use std::time::Duration;

use thiserror::Error;

use bagstore_types::ContentHash;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("ledger error: {0}")]
    Ledger(#[from] bagstore_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] bagstore_store::StoreError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("peer {url} does not hold {hash}")]
    PeerMissing { url: String, hash: ContentHash },

    #[error("peer {url} sent more than the expected {limit} bytes")]
    Oversized { url: String, limit: u64 },

    #[error("no peer holds {0}")]
    NoCandidates(ContentHash),

    #[error("all {attempts} candidate peers failed for {hash}")]
    AllCandidatesFailed { hash: ContentHash, attempts: usize },

    #[error("task timed out after {0:?}")]
    Timeout(Duration),
}

pub type SyncResult<T> = Result<T, SyncError>;
