use serde::{Deserialize, Serialize};

use crate::bag::BagId;
use crate::hash::ContentHash;
use crate::ids::DataObjectId;

/// Where a data object stands from this node's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AcceptanceState {
    /// Registered on the ledger, bytes not yet confirmed by a storage operator.
    Pending,
    /// Confirmed on the ledger.
    Accepted,
    /// Not held locally.
    Absent,
}

/// A single content-addressed blob referenced by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObject {
    pub id: DataObjectId,
    pub bag_id: BagId,
    pub content_hash: ContentHash,
    pub size: u64,
    pub state: AcceptanceState,
}

impl DataObject {
    /// A freshly registered object awaiting upload.
    pub fn pending(id: DataObjectId, bag_id: BagId, content_hash: ContentHash, size: u64) -> Self {
        Self {
            id,
            bag_id,
            content_hash,
            size,
            state: AcceptanceState::Pending,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.state == AcceptanceState::Accepted
    }

    /// The state to report for this object given whether its blob is held
    /// locally.
    pub fn local_state(&self, held: bool) -> AcceptanceState {
        if held {
            self.state
        } else {
            AcceptanceState::Absent
        }
    }
}
