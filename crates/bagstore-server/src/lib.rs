//! HTTP surface of a bagstore storage node.
//!
//! Accepts multipart uploads, checks them against the ledger, and confirms
//! them on chain; issues upload tokens; serves stored blobs to peers; and
//! runs the background synchronizer next to the HTTP listener.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | `POST` | `/upload` | multipart `file`, `dataObjectId`, `storageBucketId`, `bagId` |
//! | `POST` | `/authtoken` | signed token request, returns an encoded upload token |
//! | `GET` | `/files/:hash` | raw blob bytes |
//! | `GET` | `/health` | liveness |
//! | `GET` | `/state` | sync state and the last pass report |
//!
//! Failures of `/upload` and `/authtoken` answer `410` with
//! `{"type", "kind", "message"}`.

pub mod admission;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use admission::{AdmissionService, OperatorIdentity, UploadForm, UploadReceipt};
pub use config::{query_node_url, NodeConfig, DEFAULT_PORT};
pub use error::{ApiError, ErrorKind, ServerError, ServerResult, UploadError};
pub use router::{build_router, AppState, MULTIPART_SLACK};
pub use server::{load_signing_key, StorageNode};
