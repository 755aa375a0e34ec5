use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use bagstore_ledger::OperatorEndpoint;
use bagstore_store::BlobInfo;
use bagstore_types::{BagId, ContentHash, DataObject};

use crate::types::SyncTask;

/// Diff engine: compares desired objects against held blobs.
///
/// Comparison is by content hash. Several ledger objects with identical bytes
/// share one blob, so they produce at most one fetch.
pub struct Planner;

impl Planner {
    /// Accepted objects whose blob is not held, one per distinct hash.
    ///
    /// Pending objects are never fetched: no peer is expected to hold bytes
    /// the ledger has not confirmed yet.
    pub fn compute_fetches<'a>(
        desired: &'a [DataObject],
        held: &HashSet<ContentHash>,
    ) -> Vec<&'a DataObject> {
        let mut seen = HashSet::new();
        desired
            .iter()
            .filter(|o| o.is_accepted())
            .filter(|o| !held.contains(&o.content_hash))
            .filter(|o| seen.insert(o.content_hash))
            .collect()
    }

    /// Newest modification time a blob may have and still be pruned.
    pub fn prune_cutoff(now_ms: u64, grace: Duration) -> u64 {
        now_ms.saturating_sub(grace.as_millis() as u64)
    }

    /// Held blobs that no desired object references and that were last
    /// modified at or before `cutoff_ms`.
    ///
    /// Pending objects count as desired, which keeps a fresh upload alive
    /// before its acceptance is indexed.
    pub fn compute_prunes(desired: &[DataObject], held: &[BlobInfo], cutoff_ms: u64) -> Vec<ContentHash> {
        let wanted: HashSet<ContentHash> = desired.iter().map(|o| o.content_hash).collect();
        held.iter()
            .filter(|b| !wanted.contains(&b.hash))
            .filter(|b| b.modified_ms <= cutoff_ms)
            .map(|b| b.hash)
            .collect()
    }

    /// Bags that at least one fetch will need peers for.
    pub fn bags_needing_peers(fetches: &[&DataObject]) -> Vec<BagId> {
        let mut bags: Vec<BagId> = fetches.iter().map(|o| o.bag_id).collect();
        bags.sort();
        bags.dedup();
        bags
    }

    /// Full plan: fetches first, then prunes. Prune tasks carry the cutoff
    /// so the executor can refuse a blob re-published since planning.
    pub fn plan(
        desired: &[DataObject],
        held: &[BlobInfo],
        peers: &BTreeMap<BagId, Vec<OperatorEndpoint>>,
        now_ms: u64,
        grace: Duration,
    ) -> Vec<SyncTask> {
        let held_hashes: HashSet<ContentHash> = held.iter().map(|b| b.hash).collect();
        let fetches = Self::compute_fetches(desired, &held_hashes);
        let cutoff_ms = Self::prune_cutoff(now_ms, grace);
        let prunes = Self::compute_prunes(desired, held, cutoff_ms);

        let mut tasks = Vec::with_capacity(fetches.len() + prunes.len());
        for object in fetches {
            let candidates = peers.get(&object.bag_id).cloned().unwrap_or_default();
            tasks.push(SyncTask::fetch(object, candidates));
        }
        tasks.extend(prunes.into_iter().map(|hash| SyncTask::prune(hash, cutoff_ms)));
        tasks
    }
}
