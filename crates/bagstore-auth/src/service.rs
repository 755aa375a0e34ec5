use std::sync::Arc;

use tracing::{debug, warn};

use bagstore_crypto::SigningKey;
use bagstore_ledger::LedgerGateway;
use bagstore_types::{AccountId, BagId, Clock, DataObjectId, MemberId, StorageBucketId};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::{TokenPayload, TokenRequest, UploadToken, UploadTokenBody};

/// The upload a client is attempting, as named in the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadTarget {
    pub data_object_id: DataObjectId,
    pub storage_bucket_id: StorageBucketId,
    pub bag_id: BagId,
}

/// Issues and checks upload tokens.
///
/// Signature checks are pure. Anything touching membership goes to the
/// ledger on every call; nothing is cached, so a controller account rotated
/// on chain takes effect immediately.
pub struct TokenService {
    ledger: Arc<dyn LedgerGateway>,
    signing_key: Option<Arc<SigningKey>>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl TokenService {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        signing_key: Option<Arc<SigningKey>>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            ledger,
            signing_key,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Account whose key signs issued tokens.
    pub fn operator_account(&self) -> Option<AccountId> {
        self.signing_key.as_ref().map(|k| k.account_id())
    }

    /// Sign `payload` together with the current time.
    pub fn issue(&self, payload: TokenPayload) -> AuthResult<UploadToken> {
        let key = self
            .signing_key
            .as_deref()
            .ok_or(AuthError::SigningKeyUnavailable)?;
        let body = UploadTokenBody {
            issued_at_ms: self.clock.now_ms(),
            payload,
        };
        debug!(
            object = %body.payload.data_object_id,
            member = %body.payload.member_id,
            "issuing upload token"
        );
        UploadToken::sign(body, key)
    }

    /// Signature check alone: was `request` signed by the account it names?
    pub fn verify(&self, request: &TokenRequest) -> bool {
        request.is_signed_by(&request.body.account_id)
    }

    /// Full check of a token request against live ledger state.
    pub async fn validate(&self, request: &TokenRequest) -> AuthResult<()> {
        let payload = &request.body;
        if !self.verify(request) {
            warn!(
                account = %payload.account_id,
                member = %payload.member_id,
                "token request signature rejected"
            );
            return Err(AuthError::InvalidSignature);
        }
        self.check_controller(payload.member_id, &payload.account_id)
            .await
    }

    /// Was `token` issued by this node's operator key?
    pub fn verify_token(&self, token: &UploadToken) -> bool {
        match self.operator_account() {
            Some(operator) => token.is_signed_by(&operator),
            None => false,
        }
    }

    /// Enforce `max_token_age` against a token's issue time. Without a
    /// configured window every issue time is accepted.
    pub fn check_freshness(&self, issued_at_ms: u64) -> AuthResult<()> {
        let Some(max_age) = self.config.max_token_age() else {
            return Ok(());
        };
        let now = self.clock.now_ms();
        let window = max_age.as_millis() as u64;
        if now.abs_diff(issued_at_ms) > window {
            return Err(AuthError::Expired {
                issued_at_ms,
                max_age_secs: max_age.as_secs(),
            });
        }
        Ok(())
    }

    /// Everything an upload needs from its token: our signature, the exact
    /// target, freshness, and a controller account that is still current.
    pub async fn authorize_upload(&self, token: &UploadToken, target: &UploadTarget) -> AuthResult<()> {
        if !self.verify_token(token) {
            warn!(object = %target.data_object_id, "upload token signature rejected");
            return Err(AuthError::InvalidSignature);
        }
        let payload = &token.body.payload;
        let mismatch = if payload.data_object_id != target.data_object_id {
            Some("dataObjectId")
        } else if payload.storage_bucket_id != target.storage_bucket_id {
            Some("storageBucketId")
        } else if payload.bag_id != target.bag_id {
            Some("bagId")
        } else {
            None
        };
        if let Some(field) = mismatch {
            warn!(object = %target.data_object_id, field, "upload token used for another target");
            return Err(AuthError::TargetMismatch { field });
        }
        if let Err(e) = self.check_freshness(token.body.issued_at_ms) {
            warn!(object = %target.data_object_id, "expired upload token presented");
            return Err(e);
        }
        self.check_controller(payload.member_id, &payload.account_id)
            .await
    }

    async fn check_controller(&self, member: MemberId, claimed: &AccountId) -> AuthResult<()> {
        match self.ledger.member_controller(member).await? {
            None => {
                warn!(member = %member, "token requested for unknown member");
                Err(AuthError::UnknownMember(member))
            }
            Some(controller) if controller != *claimed => {
                warn!(
                    member = %member,
                    claimed = %claimed,
                    "claimed account is not the member's controller"
                );
                Err(AuthError::MismatchedController {
                    member,
                    claimed: *claimed,
                })
            }
            Some(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("operator", &self.operator_account())
            .field("config", &self.config)
            .finish()
    }
}
