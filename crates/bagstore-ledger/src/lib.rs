//! Ledger and indexer boundary for the bagstore storage node.
//!
//! The chain is an external collaborator. This crate defines what the node
//! needs from it and ships the implementations the node runs with:
//! - [`LedgerGateway`] -- authoritative reads and the data object
//!   acceptance call, scoped per [`WorkingGroup`](bagstore_types::WorkingGroup)
//! - [`Indexer`] -- bulk queries over indexed chain state
//! - [`InMemoryLedger`] -- both traits over shared in-memory state, for tests
//!   and development nodes
//! - [`LedgerSnapshot`] -- TOML fixture that seeds an [`InMemoryLedger`]
//! - [`QueryNodeClient`] -- [`Indexer`] over a query node's GraphQL API

pub mod error;
pub mod memory;
pub mod query_node;
pub mod snapshot;
pub mod traits;

pub use error::{LedgerError, LedgerResult};
pub use memory::{InMemoryLedger, DEFAULT_MAX_DATA_OBJECT_SIZE};
pub use query_node::QueryNodeClient;
pub use snapshot::LedgerSnapshot;
pub use traits::{AcceptPendingObjects, Indexer, LedgerGateway, OperatorEndpoint};
