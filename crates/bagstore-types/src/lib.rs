//! Foundation types for the bagstore storage node.
//!
//! Every other bagstore crate depends on `bagstore-types`.
//!
//! # Key Types
//!
//! - [`ContentHash`] -- BLAKE3 content address, also the on-disk blob name
//! - [`BagId`] -- structured bag identifier with its textual grammar
//! - [`DataObject`] -- a ledger-registered blob and its [`AcceptanceState`]
//! - [`StorageBucket`] -- a bucket and the bags assigned to it
//! - Numeric ids ([`DataObjectId`], [`StorageBucketId`], [`MemberId`],
//!   [`WorkerId`], [`ChannelId`]) and [`AccountId`]
//! - [`Clock`] -- injectable wall clock

pub mod bag;
pub mod bucket;
pub mod clock;
pub mod error;
pub mod hash;
pub mod ids;
pub mod object;

pub use bag::{BagId, BagKind, DynamicBagId, StaticBagId, WorkingGroup};
pub use bucket::StorageBucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BagIdError, TypeError};
pub use hash::ContentHash;
pub use ids::{AccountId, ChannelId, DataObjectId, MemberId, StorageBucketId, WorkerId};
pub use object::{AcceptanceState, DataObject};
