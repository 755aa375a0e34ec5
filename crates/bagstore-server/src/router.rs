use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use bagstore_store::ContentStore;
use bagstore_sync::Synchronizer;

use crate::admission::AdmissionService;
use crate::handler;

/// Room for multipart boundaries and the text fields around the file.
pub const MULTIPART_SLACK: u64 = 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionService>,
    pub store: Arc<dyn ContentStore>,
    /// Present when background sync runs.
    pub sync: Option<Arc<Synchronizer>>,
}

/// Build the router. Request bodies are capped at `max_object_size` plus
/// [`MULTIPART_SLACK`].
pub fn build_router(state: AppState, max_object_size: u64) -> Router {
    let limit = usize::try_from(max_object_size.saturating_add(MULTIPART_SLACK)).unwrap_or(usize::MAX);
    Router::new()
        .route("/upload", post(handler::upload))
        .route("/authtoken", post(handler::auth_token))
        .route("/files/:hash", get(handler::file))
        .route("/health", get(handler::health))
        .route("/state", get(handler::node_state))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
