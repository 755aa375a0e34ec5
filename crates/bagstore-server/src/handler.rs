use axum::body::Bytes;
use axum::extract::multipart::{Field, Multipart, MultipartRejection};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use bagstore_auth::{AuthError, TokenRequest};
use bagstore_store::CommittedBlob;
use bagstore_sync::{PassReport, SyncState};
use bagstore_types::{ContentHash, WorkerId};

use crate::admission::{AdmissionService, UploadForm};
use crate::error::{ApiError, UploadError};
use crate::router::AppState;

/// Header carrying an encoded upload token.
pub const UPLOAD_TOKEN_HEADER: &str = "x-upload-token";

/// POST /upload
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let multipart = multipart.map_err(|e| UploadError::InvalidField {
        field: "body",
        reason: e.body_text(),
    })?;
    let mut form = read_form(&state.admission, multipart).await?;
    form.upload_token = headers
        .get(UPLOAD_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.admission.admit_upload(form).await?;
    Ok((StatusCode::CREATED, Json(json!({ "file": "received" }))))
}

/// Collect the upload form, streaming the `file` part straight into the
/// store as it arrives.
async fn read_form(
    admission: &AdmissionService,
    mut multipart: Multipart,
) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();
    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => form.file = Some(stream_file(admission, &mut field).await?),
            "dataObjectId" => form.data_object_id = Some(field.text().await.map_err(malformed)?),
            "storageBucketId" => {
                form.storage_bucket_id = Some(field.text().await.map_err(malformed)?)
            }
            "bagId" => form.bag_id = Some(field.text().await.map_err(malformed)?),
            other => debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

async fn stream_file(
    admission: &AdmissionService,
    field: &mut Field<'_>,
) -> Result<CommittedBlob, UploadError> {
    let mut writer = admission.begin_file().await?;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                if let Err(abort) = writer.abort().await {
                    warn!(error = %abort, "failed to discard partial upload");
                }
                return Err(malformed(e));
            }
        };
        if let Err(e) = writer.write(&chunk).await {
            if let Err(abort) = writer.abort().await {
                warn!(error = %abort, "failed to discard partial upload");
            }
            return Err(e.into());
        }
    }
    Ok(writer.commit().await?)
}

fn malformed(e: axum::extract::multipart::MultipartError) -> UploadError {
    UploadError::InvalidField {
        field: "body",
        reason: e.body_text(),
    }
}

/// POST /authtoken
pub async fn auth_token(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: TokenRequest = serde_json::from_slice(&body)
        .map_err(|e| AuthError::MalformedToken(format!("token request: {e}")))?;
    let token = state.admission.issue_auth_token(&request).await?;
    let encoded = token.encode()?;
    Ok((StatusCode::CREATED, Json(json!({ "token": encoded }))))
}

/// GET /files/:hash
pub async fn file(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    let Ok(hash) = ContentHash::from_hex(&hash) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match state.store.get(&hash).await {
        Ok(Some(bytes)) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(hash = %hash.short_hex(), error = %e, "failed to read blob");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub worker_id: WorkerId,
    pub sync_enabled: bool,
    pub sync_state: Option<SyncState>,
    pub last_pass: Option<PassReport>,
}

/// GET /state
pub async fn node_state(State(state): State<AppState>) -> Json<NodeState> {
    let sync = state.sync.as_deref();
    Json(NodeState {
        worker_id: state.admission.operator().worker_id,
        sync_enabled: sync.is_some(),
        sync_state: sync.map(|s| s.state()),
        last_pass: sync.and_then(|s| s.last_report()),
    })
}
