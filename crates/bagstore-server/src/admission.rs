use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use bagstore_auth::{AuthError, TokenRequest, TokenService, UploadTarget, UploadToken};
use bagstore_crypto::SigningKey;
use bagstore_ledger::{AcceptPendingObjects, LedgerError, LedgerGateway};
use bagstore_store::{BlobWriter, CommittedBlob, ContentStore};
use bagstore_types::{
    AccountId, BagId, ContentHash, DataObjectId, StorageBucketId, WorkerId, WorkingGroup,
};

use crate::error::UploadError;

/// Who this node acts as on the ledger.
#[derive(Clone)]
pub struct OperatorIdentity {
    pub worker_id: WorkerId,
    signing_key: Option<Arc<SigningKey>>,
}

impl OperatorIdentity {
    pub fn new(worker_id: WorkerId, signing_key: Option<Arc<SigningKey>>) -> Self {
        Self {
            worker_id,
            signing_key,
        }
    }

    pub fn signing_key(&self) -> Option<Arc<SigningKey>> {
        self.signing_key.clone()
    }

    /// Role account submitting ledger calls for the worker.
    pub fn account(&self) -> Option<AccountId> {
        self.signing_key.as_ref().map(|k| k.account_id())
    }
}

impl std::fmt::Debug for OperatorIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorIdentity")
            .field("worker_id", &self.worker_id)
            .field("account", &self.account())
            .finish()
    }
}

/// A received upload: the committed blob plus the raw form fields.
#[derive(Clone, Debug, Default)]
pub struct UploadForm {
    pub file: Option<CommittedBlob>,
    pub data_object_id: Option<String>,
    pub storage_bucket_id: Option<String>,
    pub bag_id: Option<String>,
    /// Encoded token from the `x-upload-token` header.
    pub upload_token: Option<String>,
}

/// What the node confirmed on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub data_object_id: DataObjectId,
    pub storage_bucket_id: StorageBucketId,
    pub bag_id: BagId,
    pub content_hash: ContentHash,
    pub size: u64,
}

/// Turns uploaded bytes into ledger-accepted data objects.
///
/// Bytes are committed to the content store before any ledger check, and
/// are left in place when a later check fails so a retry only has to
/// repeat the ledger call.
pub struct AdmissionService {
    operator: OperatorIdentity,
    ledger: Arc<dyn LedgerGateway>,
    store: Arc<dyn ContentStore>,
    tokens: Arc<TokenService>,
    require_upload_token: bool,
}

impl AdmissionService {
    pub fn new(
        operator: OperatorIdentity,
        ledger: Arc<dyn LedgerGateway>,
        store: Arc<dyn ContentStore>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            operator,
            ledger,
            store,
            tokens,
            require_upload_token: false,
        }
    }

    pub fn require_upload_token(mut self, required: bool) -> Self {
        self.require_upload_token = required;
        self
    }

    pub fn operator(&self) -> &OperatorIdentity {
        &self.operator
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Open a streaming write for an incoming file part.
    pub async fn begin_file(&self) -> Result<Box<dyn BlobWriter>, UploadError> {
        Ok(self.store.begin_write().await?)
    }

    pub async fn admit_upload(&self, form: UploadForm) -> Result<UploadReceipt, UploadError> {
        let file = form.file.ok_or(UploadError::NoFileProvided)?;

        let data_object_id: DataObjectId = parse_field("dataObjectId", form.data_object_id)?;
        let storage_bucket_id: StorageBucketId =
            parse_field("storageBucketId", form.storage_bucket_id)?;
        let bag_id = BagId::parse(form.bag_id.as_deref().ok_or(UploadError::missing("bagId"))?)?;
        let target = UploadTarget {
            data_object_id,
            storage_bucket_id,
            bag_id,
        };

        match form.upload_token.as_deref() {
            Some(encoded) => {
                let token = UploadToken::decode(encoded)?;
                self.tokens.authorize_upload(&token, &target).await?;
            }
            None if self.require_upload_token => {
                warn!(object = %data_object_id, "upload without token refused");
                return Err(AuthError::MalformedToken("missing x-upload-token header".into()).into());
            }
            None => {}
        }

        let bucket = self
            .ledger
            .storage_bucket(storage_bucket_id)
            .await?
            .ok_or(LedgerError::UnknownBucket(storage_bucket_id))?;
        if !bucket.accepting_new_data {
            return Err(UploadError::BucketNotAccepting(storage_bucket_id));
        }

        if let Some(object) = self.ledger.data_object(&bag_id, data_object_id).await? {
            if object.content_hash != file.hash {
                warn!(
                    object = %data_object_id,
                    expected = %object.content_hash.short_hex(),
                    received = %file.hash.short_hex(),
                    "uploaded bytes do not match the registered object"
                );
                return Err(UploadError::ContentMismatch {
                    expected: object.content_hash,
                    received: file.hash,
                });
            }
        }

        let signer = self
            .operator
            .account()
            .ok_or(AuthError::SigningKeyUnavailable)?;
        let request = AcceptPendingObjects {
            worker_id: self.operator.worker_id,
            storage_bucket_id,
            bag_id,
            data_object_ids: BTreeSet::from([data_object_id]),
            signer,
        };
        if let Err(e) = self
            .ledger
            .accept_pending_data_objects(WorkingGroup::Storage, &request)
            .await
        {
            warn!(object = %data_object_id, bag = %bag_id, error = %e, "ledger refused acceptance");
            return Err(e.into());
        }

        info!(
            object = %data_object_id,
            bucket = %storage_bucket_id,
            bag = %bag_id,
            hash = %file.hash.short_hex(),
            size = file.size,
            "upload accepted"
        );
        Ok(UploadReceipt {
            data_object_id,
            storage_bucket_id,
            bag_id,
            content_hash: file.hash,
            size: file.size,
        })
    }

    /// Check a client's token request against the ledger and sign a token.
    pub async fn issue_auth_token(&self, request: &TokenRequest) -> Result<UploadToken, AuthError> {
        self.tokens.validate(request).await?;
        self.tokens.issue(request.body.clone())
    }
}

fn parse_field<T>(field: &'static str, value: Option<String>) -> Result<T, UploadError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = value.ok_or(UploadError::missing(field))?;
    value.trim().parse().map_err(|e: T::Err| UploadError::InvalidField {
        field,
        reason: e.to_string(),
    })
}
