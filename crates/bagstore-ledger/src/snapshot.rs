//! TOML fixture describing chain state, used to run a node without a chain.
//!
//! ```toml
//! max_data_object_size = 1048576
//!
//! [[members]]
//! id = 1
//! controller = "<64 hex chars>"
//!
//! [[workers]]
//! group = "storage"
//! id = 0
//! role_account = "<64 hex chars>"
//!
//! [[buckets]]
//! id = 0
//! operator = 0
//! assigned_bags = ["static:council", "dynamic:member:1"]
//! endpoint = "http://localhost:3333"
//!
//! [[objects]]
//! id = 42
//! bag_id = "static:council"
//! content_hash = "<64 hex chars>"
//! size = 12
//! state = "accepted"
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use bagstore_types::{
    AcceptanceState, AccountId, BagId, ContentHash, DataObject, DataObjectId, MemberId,
    StorageBucket, StorageBucketId, WorkerId, WorkingGroup,
};

use crate::error::{LedgerError, LedgerResult};
use crate::memory::InMemoryLedger;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub max_data_object_size: Option<u64>,
    #[serde(default)]
    pub members: Vec<MemberEntry>,
    #[serde(default)]
    pub workers: Vec<WorkerEntry>,
    #[serde(default)]
    pub buckets: Vec<BucketEntry>,
    #[serde(default)]
    pub objects: Vec<ObjectEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub id: MemberId,
    pub controller: AccountId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerEntry {
    #[serde(default = "storage_group")]
    pub group: WorkingGroup,
    pub id: WorkerId,
    pub role_account: AccountId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    #[serde(default = "storage_group")]
    pub group: WorkingGroup,
    pub id: StorageBucketId,
    #[serde(default)]
    pub operator: Option<WorkerId>,
    #[serde(default)]
    pub assigned_bags: BTreeSet<BagId>,
    #[serde(default = "accepting")]
    pub accepting_new_data: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub id: DataObjectId,
    pub bag_id: BagId,
    pub content_hash: ContentHash,
    pub size: u64,
    #[serde(default = "pending")]
    pub state: AcceptanceState,
}

fn storage_group() -> WorkingGroup {
    WorkingGroup::Storage
}

fn accepting() -> bool {
    true
}

fn pending() -> AcceptanceState {
    AcceptanceState::Pending
}

impl LedgerSnapshot {
    pub fn from_toml_str(input: &str) -> LedgerResult<Self> {
        let snapshot: Self =
            toml::from_str(input).map_err(|e| LedgerError::Snapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Snapshot(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }

    fn validate(&self) -> LedgerResult<()> {
        let mut bucket_ids = BTreeSet::new();
        for bucket in &self.buckets {
            if !bucket_ids.insert(bucket.id) {
                return Err(LedgerError::Snapshot(format!(
                    "duplicate storage bucket {}",
                    bucket.id
                )));
            }
        }
        let mut object_keys = BTreeSet::new();
        for object in &self.objects {
            if object.state == AcceptanceState::Absent {
                return Err(LedgerError::Snapshot(format!(
                    "data object {} cannot be registered as absent",
                    object.id
                )));
            }
            if !object_keys.insert((object.bag_id, object.id)) {
                return Err(LedgerError::Snapshot(format!(
                    "duplicate data object {} in bag {}",
                    object.id, object.bag_id
                )));
            }
        }
        Ok(())
    }

    /// Build a ledger holding exactly this state.
    pub fn into_ledger(self) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        if let Some(max) = self.max_data_object_size {
            ledger.set_max_data_object_size(max);
        }
        for member in self.members {
            ledger.set_member_controller(member.id, member.controller);
        }
        for worker in self.workers {
            ledger.add_worker(worker.group, worker.id, worker.role_account);
        }
        for entry in self.buckets {
            ledger.add_bucket(
                entry.group,
                StorageBucket {
                    id: entry.id,
                    operator: entry.operator,
                    assigned_bags: entry.assigned_bags,
                    accepting_new_data: entry.accepting_new_data,
                },
            );
            if let Some(url) = entry.endpoint {
                ledger.set_bucket_endpoint(entry.id, url);
            }
        }
        for object in self.objects {
            ledger.register_object(DataObject {
                id: object.id,
                bag_id: object.bag_id,
                content_hash: object.content_hash,
                size: object.size,
                state: object.state,
            });
        }
        ledger
    }
}
