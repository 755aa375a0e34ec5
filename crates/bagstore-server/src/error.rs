use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use bagstore_auth::AuthError;
use bagstore_ledger::LedgerError;
use bagstore_store::StoreError;
use bagstore_sync::SyncError;
use bagstore_types::{BagIdError, ContentHash, StorageBucketId};

/// Startup and wiring failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("operator key error: {0}")]
    OperatorKey(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Coarse class of a request failure, telling the client whether a retry
/// can help.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Fix the request; retrying it unchanged will fail again.
    Validation,
    Authorization,
    /// Ledger trouble, retry later.
    Ledger,
    /// Local storage trouble, retry later.
    Storage,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Ledger | Self::Storage)
    }
}

/// Why an upload was refused.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file provided")]
    NoFileProvided,

    #[error("{0}")]
    InvalidBagId(#[from] BagIdError),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("storage bucket {0} is not accepting new data")]
    BucketNotAccepting(StorageBucketId),

    #[error("uploaded content {received} does not match registered hash {expected}")]
    ContentMismatch {
        expected: ContentHash,
        received: ContentHash,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("ledger rejected the upload: {0}")]
    LedgerRejected(#[from] LedgerError),

    #[error("storage error: {0}")]
    StorageIo(#[from] StoreError),
}

impl UploadError {
    pub(crate) fn missing(field: &'static str) -> Self {
        Self::InvalidField {
            field,
            reason: "missing".to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoFileProvided
            | Self::InvalidBagId(_)
            | Self::InvalidField { .. }
            | Self::ContentMismatch { .. } => ErrorKind::Validation,
            Self::BucketNotAccepting(_) => ErrorKind::Ledger,
            Self::Unauthorized(e) => auth_kind(e),
            Self::LedgerRejected(_) => ErrorKind::Ledger,
            Self::StorageIo(_) => ErrorKind::Storage,
        }
    }
}

fn auth_kind(error: &AuthError) -> ErrorKind {
    match error {
        AuthError::Ledger(_) => ErrorKind::Ledger,
        AuthError::MalformedToken(_) => ErrorKind::Validation,
        _ => ErrorKind::Authorization,
    }
}

/// Structured failure body: `410 {"type", "kind", "message"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn upload(error: &UploadError) -> Self {
        Self {
            error_type: "upload",
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn authtoken(error: &AuthError) -> Self {
        Self {
            error_type: "authtoken",
            kind: auth_kind(error),
            message: error.to_string(),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(error: UploadError) -> Self {
        Self::upload(&error)
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self::authtoken(&error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::GONE, Json(self)).into_response()
    }
}
