//! Upload capability tokens for the bagstore storage node.
//!
//! A client that wants to upload first asks the node for a token: it signs a
//! [`TokenPayload`] naming the upload target and its own account, and the
//! node checks that signature plus the live ledger binding between member
//! and controller account before signing the payload itself. The resulting
//! [`UploadToken`] is never stored; the node recognizes it later purely by
//! its own signature.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), bagstore_auth::AuthError> {
//! use std::sync::Arc;
//! use bagstore_auth::{AuthConfig, TokenPayload, TokenRequest, TokenService};
//! use bagstore_crypto::SigningKey;
//! use bagstore_ledger::InMemoryLedger;
//! use bagstore_types::{BagId, DataObjectId, MemberId, StorageBucketId, SystemClock};
//!
//! let ledger = Arc::new(InMemoryLedger::new());
//! let client = SigningKey::generate();
//! ledger.set_member_controller(MemberId(1), client.account_id());
//!
//! let service = TokenService::new(
//!     ledger,
//!     Some(Arc::new(SigningKey::generate())),
//!     Arc::new(SystemClock),
//!     AuthConfig::default(),
//! );
//! let request = TokenRequest::new(
//!     TokenPayload {
//!         data_object_id: DataObjectId(42),
//!         storage_bucket_id: StorageBucketId(0),
//!         bag_id: BagId::COUNCIL,
//!         member_id: MemberId(1),
//!         account_id: client.account_id(),
//!     },
//!     &client,
//! )?;
//! service.validate(&request).await?;
//! let token = service.issue(request.body)?;
//! assert!(service.verify_token(&token));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use service::{TokenService, UploadTarget};
pub use token::{signing_bytes, Signed, TokenPayload, TokenRequest, UploadToken, UploadTokenBody};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use bagstore_crypto::SigningKey;
    use bagstore_ledger::InMemoryLedger;
    use bagstore_types::{
        AccountId, BagId, DataObjectId, ManualClock, MemberId, StorageBucketId,
    };

    const MEMBER: MemberId = MemberId(7);

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        clock: Arc<ManualClock>,
        client: SigningKey,
        service: TokenService,
    }

    fn fixture(config: AuthConfig) -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let client = SigningKey::generate();
        ledger.set_member_controller(MEMBER, client.account_id());
        let service = TokenService::new(
            ledger.clone(),
            Some(Arc::new(SigningKey::generate())),
            clock.clone(),
            config,
        );
        Fixture {
            ledger,
            clock,
            client,
            service,
        }
    }

    fn payload(account: AccountId) -> TokenPayload {
        TokenPayload {
            data_object_id: DataObjectId(42),
            storage_bucket_id: StorageBucketId(1),
            bag_id: BagId::COUNCIL,
            member_id: MEMBER,
            account_id: account,
        }
    }

    fn target() -> UploadTarget {
        UploadTarget {
            data_object_id: DataObjectId(42),
            storage_bucket_id: StorageBucketId(1),
            bag_id: BagId::COUNCIL,
        }
    }

    // -----------------------------------------------------------------------
    // 1. Request validation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn valid_request_passes() {
        let f = fixture(AuthConfig::default());
        let request = TokenRequest::new(payload(f.client.account_id()), &f.client).unwrap();
        assert!(f.service.verify(&request));
        f.service.validate(&request).await.unwrap();
    }

    #[tokio::test]
    async fn forged_signature_is_rejected() {
        let f = fixture(AuthConfig::default());
        let intruder = SigningKey::generate();
        // Claims the member's controller account but signs with another key.
        let request = TokenRequest::new(payload(f.client.account_id()), &intruder).unwrap();
        assert!(!f.service.verify(&request));
        assert_eq!(
            f.service.validate(&request).await.unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[tokio::test]
    async fn unknown_member_is_rejected() {
        let f = fixture(AuthConfig::default());
        let mut body = payload(f.client.account_id());
        body.member_id = MemberId(999);
        let request = TokenRequest::new(body, &f.client).unwrap();
        assert_eq!(
            f.service.validate(&request).await.unwrap_err(),
            AuthError::UnknownMember(MemberId(999))
        );
    }

    #[tokio::test]
    async fn rotated_controller_fails_validate_but_not_verify() {
        let f = fixture(AuthConfig::default());
        let request = TokenRequest::new(payload(f.client.account_id()), &f.client).unwrap();
        f.service.validate(&request).await.unwrap();

        f.ledger
            .set_member_controller(MEMBER, SigningKey::generate().account_id());

        assert!(f.service.verify(&request));
        let err = f.service.validate(&request).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::MismatchedController {
                member: MEMBER,
                claimed: f.client.account_id()
            }
        );
        assert!(err.is_security_event());
    }

    #[tokio::test]
    async fn ledger_outage_is_not_a_security_event() {
        let f = fixture(AuthConfig::default());
        let request = TokenRequest::new(payload(f.client.account_id()), &f.client).unwrap();
        f.ledger.set_offline(true);
        let err = f.service.validate(&request).await.unwrap_err();
        assert!(matches!(err, AuthError::Ledger(_)));
        assert!(!err.is_security_event());
    }

    // -----------------------------------------------------------------------
    // 2. Issuance
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn issued_token_carries_clock_time() {
        let f = fixture(AuthConfig::default());
        let token = f.service.issue(payload(f.client.account_id())).unwrap();
        assert_eq!(token.body.issued_at_ms, 1_700_000_000_000);
        assert!(f.service.verify_token(&token));
        assert_eq!(token.body.payload, payload(f.client.account_id()));
    }

    #[tokio::test]
    async fn node_without_key_cannot_issue() {
        let ledger = Arc::new(InMemoryLedger::new());
        let service = TokenService::new(
            ledger,
            None,
            Arc::new(ManualClock::new(0)),
            AuthConfig::default(),
        );
        let client = SigningKey::generate();
        assert_eq!(
            service.issue(payload(client.account_id())).unwrap_err(),
            AuthError::SigningKeyUnavailable
        );
        assert!(service.operator_account().is_none());
    }

    #[tokio::test]
    async fn token_from_another_node_is_not_ours() {
        let a = fixture(AuthConfig::default());
        let b = fixture(AuthConfig::default());
        let token = a.service.issue(payload(a.client.account_id())).unwrap();
        assert!(!b.service.verify_token(&token));
    }

    // -----------------------------------------------------------------------
    // 3. Upload authorization
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn token_authorizes_its_own_target() {
        let f = fixture(AuthConfig::default());
        let token = f.service.issue(payload(f.client.account_id())).unwrap();
        f.service.authorize_upload(&token, &target()).await.unwrap();
    }

    #[tokio::test]
    async fn token_does_not_transfer_to_other_objects() {
        let f = fixture(AuthConfig::default());
        let token = f.service.issue(payload(f.client.account_id())).unwrap();
        let mut other = target();
        other.data_object_id = DataObjectId(43);
        assert_eq!(
            f.service.authorize_upload(&token, &other).await.unwrap_err(),
            AuthError::TargetMismatch {
                field: "dataObjectId"
            }
        );
        let mut other = target();
        other.bag_id = BagId::member(MemberId(1));
        assert_eq!(
            f.service.authorize_upload(&token, &other).await.unwrap_err(),
            AuthError::TargetMismatch { field: "bagId" }
        );
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let f = fixture(AuthConfig::default());
        let mut token = f.service.issue(payload(f.client.account_id())).unwrap();
        token.body.payload.data_object_id = DataObjectId(43);
        let mut t = target();
        t.data_object_id = DataObjectId(43);
        assert_eq!(
            f.service.authorize_upload(&token, &t).await.unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[tokio::test]
    async fn tokens_never_expire_by_default() {
        let f = fixture(AuthConfig::default());
        let token = f.service.issue(payload(f.client.account_id())).unwrap();
        f.clock.advance(Duration::from_secs(365 * 24 * 3600));
        f.service.authorize_upload(&token, &target()).await.unwrap();
    }

    #[tokio::test]
    async fn configured_window_expires_tokens() {
        let f = fixture(AuthConfig::with_max_token_age(Duration::from_secs(60)));
        let token = f.service.issue(payload(f.client.account_id())).unwrap();
        f.clock.advance(Duration::from_secs(60));
        f.service.authorize_upload(&token, &target()).await.unwrap();

        f.clock.advance(Duration::from_secs(1));
        assert_eq!(
            f.service.authorize_upload(&token, &target()).await.unwrap_err(),
            AuthError::Expired {
                issued_at_ms: 1_700_000_000_000,
                max_age_secs: 60
            }
        );
    }

    #[tokio::test]
    async fn future_dated_tokens_are_expired() {
        let f = fixture(AuthConfig::with_max_token_age(Duration::from_secs(60)));
        let token = f.service.issue(payload(f.client.account_id())).unwrap();
        f.clock.set(1_700_000_000_000 - 61_000);
        assert!(matches!(
            f.service.authorize_upload(&token, &target()).await,
            Err(AuthError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn upload_rechecks_controller() {
        let f = fixture(AuthConfig::default());
        let token = f.service.issue(payload(f.client.account_id())).unwrap();
        f.ledger
            .set_member_controller(MEMBER, SigningKey::generate().account_id());
        assert!(matches!(
            f.service.authorize_upload(&token, &target()).await,
            Err(AuthError::MismatchedController { .. })
        ));
    }

    #[test]
    fn config_defaults_to_no_expiry() {
        let config: AuthConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_token_age(), None);
        let config: AuthConfig = toml::from_str("max_token_age_secs = 300").unwrap();
        assert_eq!(config.max_token_age(), Some(Duration::from_secs(300)));
    }
}
