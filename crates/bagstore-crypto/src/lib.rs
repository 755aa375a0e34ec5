//! Cryptographic primitives for bagstore.
//!
//! Provides BLAKE3 content hashing (one-shot and streaming) and Ed25519
//! signing/verification for operator-issued capability tokens.
//!
//! All crypto operations wrap established libraries -- no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::{ContentHasher, StreamingHasher};
pub use signer::{verify_for_account, Signature, SignatureError, SigningKey, VerifyingKey};
