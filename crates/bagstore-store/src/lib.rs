//! Content-addressed blob storage for the bagstore storage node.
//!
//! Every blob is stored under the BLAKE3 hash of its bytes. Callers never
//! choose names: a write streams bytes through a [`BlobWriter`], and the name
//! is decided at commit time from what was actually written.
//!
//! # Storage Backends
//!
//! All backends implement the [`ContentStore`] trait:
//!
//! - [`FsContentStore`] -- one file per blob under a local directory
//! - [`InMemoryContentStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once committed.
//! 2. Write-then-rename: nothing is visible under a hash until fully written.
//! 3. Concurrent writes of identical bytes converge to one blob.
//! 4. The store never interprets blob contents.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsContentStore;
pub use memory::InMemoryContentStore;
pub use traits::{BlobInfo, BlobWriter, CommittedBlob, ContentStore};
