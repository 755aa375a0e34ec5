use std::fmt;

use bagstore_types::AccountId;
use ed25519_dalek::{Signer, Verifier};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SEED_LEN: usize = ed25519_dalek::SECRET_KEY_LENGTH;
const SIGNATURE_LEN: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Key failures. Verification failure is a plain `BadSignature`; callers
/// that only need a yes/no use `.is_ok()`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature does not match message and account")]
    BadSignature,
    #[error("seed must be {SEED_LEN} hex-encoded bytes")]
    MalformedSeed,
    #[error("account {0} is not a valid Ed25519 public key")]
    NotAPublicKey(AccountId),
}

/// An account's Ed25519 secret key. Storage operators hold one to sign
/// upload tokens and ledger calls; clients hold one to sign token requests.
pub struct SigningKey(ed25519_dalek::SigningKey);

impl SigningKey {
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()))
    }

    pub fn from_seed(seed: [u8; SEED_LEN]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&seed))
    }

    /// Key file format: the seed in hex. Surrounding whitespace is ignored.
    pub fn from_hex(text: &str) -> Result<Self, SignatureError> {
        let seed = hex::decode(text.trim())
            .ok()
            .and_then(|bytes| <[u8; SEED_LEN]>::try_from(bytes).ok())
            .ok_or(SignatureError::MalformedSeed)?;
        Ok(Self::from_seed(seed))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn account_id(&self) -> AccountId {
        AccountId::from_bytes(self.0.verifying_key().to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(account={}, <redacted>)", self.account_id())
    }
}

/// Public half of an account key. An [`AccountId`] is the raw key bytes,
/// so any account can be turned back into one.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

impl VerifyingKey {
    pub fn for_account(account: &AccountId) -> Result<Self, SignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(account.as_bytes())
            .map(Self)
            .map_err(|_| SignatureError::NotAPublicKey(*account))
    }

    pub fn account_id(&self) -> AccountId {
        AccountId::from_bytes(self.0.to_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| SignatureError::BadSignature)
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({})", self.account_id())
    }
}

/// Check that `account` signed `message`.
pub fn verify_for_account(
    account: &AccountId,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    VerifyingKey::for_account(account)?.verify(message, signature)
}

/// Ed25519 signature; hex string in JSON.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Signature({}..)", &hex[..16])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(D::Error::custom)?;
        let raw = <[u8; SIGNATURE_LEN]>::try_from(bytes)
            .map_err(|_| D::Error::custom("signature must be 64 bytes"))?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_signature_checks() {
        let alice = SigningKey::generate();
        let bob = SigningKey::generate();
        let sig = alice.sign(b"upload 42");

        assert!(verify_for_account(&alice.account_id(), b"upload 42", &sig).is_ok());
        assert_eq!(
            verify_for_account(&alice.account_id(), b"upload 43", &sig),
            Err(SignatureError::BadSignature)
        );
        assert_eq!(
            verify_for_account(&bob.account_id(), b"upload 42", &sig),
            Err(SignatureError::BadSignature)
        );
    }

    #[test]
    fn verifying_key_recovered_from_account() {
        let key = SigningKey::from_seed([9; 32]);
        let vk = VerifyingKey::for_account(&key.account_id()).unwrap();
        assert_eq!(vk, key.verifying_key());
        assert_eq!(vk.account_id(), key.account_id());
    }

    #[test]
    fn key_file_seed_parsing() {
        let key = SigningKey::generate();
        let restored = SigningKey::from_hex(&format!("  {}\n", key.to_hex())).unwrap();
        assert_eq!(restored.account_id(), key.account_id());

        assert_eq!(SigningKey::from_hex("zz").unwrap_err(), SignatureError::MalformedSeed);
        assert_eq!(SigningKey::from_hex("abcd").unwrap_err(), SignatureError::MalformedSeed);
    }

    #[test]
    fn signature_json_is_hex() {
        let sig = SigningKey::from_seed([3; 32]).sign(b"token body");
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json.as_str().map(str::len), Some(128));
        let back: Signature = serde_json::from_value(json).unwrap();
        assert_eq!(back, sig);

        assert!(serde_json::from_str::<Signature>("\"abcd\"").is_err());
    }

    #[test]
    fn debug_never_prints_seed() {
        let key = SigningKey::generate();
        let debug = format!("{key:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains(&key.to_hex()));
    }
}
