use serde::{Deserialize, Serialize};

use bagstore_ledger::OperatorEndpoint;
use bagstore_types::{BagId, ContentHash, DataObject, DataObjectId};

/// What a sync task does to the local store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncAction {
    /// Download a desired blob that is not held.
    Fetch,
    /// Delete a held blob that is no longer desired.
    Prune,
}

/// One unit of work in a reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTask {
    pub action: SyncAction,
    pub content_hash: ContentHash,
    /// Set for fetches; a pruned blob has no ledger object behind it.
    pub data_object_id: Option<DataObjectId>,
    pub bag_id: Option<BagId>,
    /// Expected size of a fetched blob; peers serving more are cut off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// A pruned blob is only deleted if it was not modified after this
    /// instant (ms since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_ms: Option<u64>,
    /// Peers believed to hold the blob, in no particular order.
    #[serde(default)]
    pub source_candidates: Vec<OperatorEndpoint>,
}

impl SyncTask {
    pub fn fetch(object: &DataObject, source_candidates: Vec<OperatorEndpoint>) -> Self {
        Self {
            action: SyncAction::Fetch,
            content_hash: object.content_hash,
            data_object_id: Some(object.id),
            bag_id: Some(object.bag_id),
            size: Some(object.size),
            cutoff_ms: None,
            source_candidates,
        }
    }

    pub fn prune(content_hash: ContentHash, cutoff_ms: u64) -> Self {
        Self {
            action: SyncAction::Prune,
            content_hash,
            data_object_id: None,
            bag_id: None,
            size: None,
            cutoff_ms: Some(cutoff_ms),
            source_candidates: Vec::new(),
        }
    }
}

/// Phase of the reconciliation loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    #[default]
    Idle,
    Planning,
    Executing,
    Sleeping,
    Stopped,
}

/// Summary of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub planned: usize,
    pub fetched: usize,
    pub pruned: usize,
    pub failed: usize,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    /// Set when the pass was abandoned before executing any task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}
