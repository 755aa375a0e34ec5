//! Token and token-request wire types.
//!
//! A [`Signed`] value carries a body and an Ed25519 signature over the
//! body's canonical JSON encoding. Which key must have produced the
//! signature depends on the value:
//!
//! - [`TokenRequest`] is signed by the account named in its payload.
//! - [`UploadToken`] is signed by the storage operator that issued it.
//!
//! On the wire an upload token travels as lowercase hex of its JSON form.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use bagstore_crypto::{verify_for_account, Signature, SigningKey};
use bagstore_types::{AccountId, BagId, DataObjectId, MemberId, StorageBucketId};

use crate::error::{AuthError, AuthResult};

/// The upload a token authorizes, and who asked for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub data_object_id: DataObjectId,
    pub storage_bucket_id: StorageBucketId,
    pub bag_id: BagId,
    pub member_id: MemberId,
    pub account_id: AccountId,
}

/// What the operator signs when issuing a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTokenBody {
    pub issued_at_ms: u64,
    pub payload: TokenPayload,
}

/// A body together with a signature over it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signed<T> {
    pub body: T,
    pub signature: Signature,
}

/// Capability issued by the node authorizing one upload.
pub type UploadToken = Signed<UploadTokenBody>;

/// Client request for an [`UploadToken`].
pub type TokenRequest = Signed<TokenPayload>;

/// The exact bytes a signature covers.
pub fn signing_bytes<T: Serialize>(body: &T) -> AuthResult<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| AuthError::MalformedToken(e.to_string()))
}

impl<T: Serialize> Signed<T> {
    pub fn sign(body: T, key: &SigningKey) -> AuthResult<Self> {
        let signature = key.sign(&signing_bytes(&body)?);
        Ok(Self { body, signature })
    }

    /// Check the signature against `account`'s public key.
    pub fn is_signed_by(&self, account: &AccountId) -> bool {
        match signing_bytes(&self.body) {
            Ok(message) => verify_for_account(account, &message, &self.signature).is_ok(),
            Err(_) => false,
        }
    }

    /// Wire form: hex of the JSON encoding.
    pub fn encode(&self) -> AuthResult<String> {
        let json = serde_json::to_vec(self).map_err(|e| AuthError::MalformedToken(e.to_string()))?;
        Ok(hex::encode(json))
    }
}

impl<T: DeserializeOwned> Signed<T> {
    pub fn decode(encoded: &str) -> AuthResult<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| AuthError::MalformedToken(format!("not hex: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| AuthError::MalformedToken(e.to_string()))
    }
}

impl TokenRequest {
    /// Build a request signed by the requesting account's key.
    pub fn new(payload: TokenPayload, key: &SigningKey) -> AuthResult<Self> {
        Self::sign(payload, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(account: AccountId) -> TokenPayload {
        TokenPayload {
            data_object_id: DataObjectId(42),
            storage_bucket_id: StorageBucketId(1),
            bag_id: BagId::COUNCIL,
            member_id: MemberId(7),
            account_id: account,
        }
    }

    #[test]
    fn request_is_signed_by_its_account() {
        let key = SigningKey::generate();
        let request = TokenRequest::new(payload(key.account_id()), &key).unwrap();
        assert!(request.is_signed_by(&key.account_id()));
        assert!(!request.is_signed_by(&SigningKey::generate().account_id()));
    }

    #[test]
    fn tampered_body_fails_signature() {
        let key = SigningKey::generate();
        let mut request = TokenRequest::new(payload(key.account_id()), &key).unwrap();
        request.body.data_object_id = DataObjectId(43);
        assert!(!request.is_signed_by(&key.account_id()));
    }

    #[test]
    fn wire_form_is_hex_json() {
        let key = SigningKey::from_seed([8; 32]);
        let token = UploadToken::sign(
            UploadTokenBody {
                issued_at_ms: 1_000,
                payload: payload(key.account_id()),
            },
            &key,
        )
        .unwrap();
        let encoded = token.encode().unwrap();
        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let json: serde_json::Value = serde_json::from_slice(&hex::decode(&encoded).unwrap()).unwrap();
        assert_eq!(json["body"]["issuedAtMs"], 1_000);
        assert_eq!(json["body"]["payload"]["bagId"], "static:council");

        let decoded = UploadToken::decode(&encoded).unwrap();
        assert_eq!(decoded, token);
        assert!(decoded.is_signed_by(&key.account_id()));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            UploadToken::decode("zz"),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            UploadToken::decode(&hex::encode(b"{\"body\":1}")),
            Err(AuthError::MalformedToken(_))
        ));
    }
}
