use bagstore_ledger::LedgerError;
use bagstore_types::{AccountId, MemberId};

/// Errors from token issuance and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The signature does not match the message and the claimed account.
    #[error("invalid signature")]
    InvalidSignature,

    #[error("member {0} does not exist")]
    UnknownMember(MemberId),

    /// The claimed account is not (or no longer) the member's controller.
    #[error("account {claimed} is not the controller account of member {member}")]
    MismatchedController { member: MemberId, claimed: AccountId },

    /// The node runs without an operator key and cannot sign tokens.
    #[error("operator signing key is not configured")]
    SigningKeyUnavailable,

    #[error("token issued at {issued_at_ms} is outside the {max_age_secs}s validity window")]
    Expired { issued_at_ms: u64, max_age_secs: u64 },

    /// The token authorizes a different upload than the one attempted.
    #[error("token does not cover this upload: {field} differs")]
    TargetMismatch { field: &'static str },

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl AuthError {
    /// `true` for rejections that suggest a forged or replayed credential,
    /// as opposed to infrastructure trouble.
    pub fn is_security_event(&self) -> bool {
        !matches!(self, Self::SigningKeyUnavailable | Self::Ledger(_))
    }
}

/// Result alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
