use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bag::BagId;
use crate::ids::{StorageBucketId, WorkerId};

/// An operational storage assignment unit.
///
/// A storage operator runs one or more buckets; each bucket is responsible
/// for a set of bags. The union of `assigned_bags` over the buckets a node
/// operates is exactly the set of bags the node must hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucket {
    pub id: StorageBucketId,
    /// Worker currently operating the bucket, if any.
    #[serde(default)]
    pub operator: Option<WorkerId>,
    #[serde(default)]
    pub assigned_bags: BTreeSet<BagId>,
    /// Operational gate: uploads into a bucket that is not accepting new
    /// data are refused before the ledger is contacted.
    #[serde(default = "default_accepting")]
    pub accepting_new_data: bool,
}

fn default_accepting() -> bool {
    true
}

impl StorageBucket {
    /// An empty bucket operated by `operator`.
    pub fn new(id: StorageBucketId, operator: WorkerId) -> Self {
        Self {
            id,
            operator: Some(operator),
            assigned_bags: BTreeSet::new(),
            accepting_new_data: true,
        }
    }

    /// Builder-style bag assignment.
    pub fn with_bag(mut self, bag: BagId) -> Self {
        self.assigned_bags.insert(bag);
        self
    }

    pub fn is_operated_by(&self, worker: WorkerId) -> bool {
        self.operator == Some(worker)
    }

    pub fn stores(&self, bag: &BagId) -> bool {
        self.assigned_bags.contains(bag)
    }
}
