//! Background reconciliation for the bagstore storage node.
//!
//! Each pass asks the ledger which bags this node's buckets hold, asks the
//! indexer which objects those bags contain, and compares the result with
//! the local content store. Missing accepted objects are fetched from peer
//! operators and verified by hash before they are committed; blobs nobody
//! references any more are pruned.

pub mod config;
pub mod error;
pub mod executor;
pub mod peers;
pub mod planner;
pub mod scheduler;
pub mod synchronizer;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use executor::{ExecutionSummary, Executor};
pub use peers::{PeerSelector, RandomPeerSelector, SequentialPeerSelector};
pub use planner::Planner;
pub use scheduler::{IntervalTicker, ManualTicker, TickHandle, Ticker};
pub use synchronizer::Synchronizer;
pub use transport::{HttpPeerTransport, PeerTransport};
pub use types::{PassReport, SyncAction, SyncState, SyncTask};
