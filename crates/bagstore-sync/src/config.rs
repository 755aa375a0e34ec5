use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the reconciliation loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Pause between passes, in minutes.
    pub interval_mins: u64,
    /// Maximum number of tasks in flight during a pass.
    pub workers: usize,
    /// Upper bound on a single task, peer fallbacks included.
    pub task_timeout_secs: u64,
    /// Blobs written more recently than this are never pruned.
    pub prune_grace_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_mins: 1,
            workers: 20,
            task_timeout_secs: 60,
            prune_grace_secs: 600,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_mins.max(1) * 60)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn prune_grace(&self) -> Duration {
        Duration::from_secs(self.prune_grace_secs)
    }

    /// Worker pool width, never zero.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}
