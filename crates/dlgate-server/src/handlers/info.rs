//! `POST /api/info`: runs a probe without fetching any media.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::MediaRequest;
use crate::error_response::ApiError;
use crate::state::AppState;

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MediaRequest>,
) -> impl IntoResponse {
    let correlation_id = Uuid::new_v4();
    if req.url.trim().is_empty() {
        return Err(ApiError::bad_request("url must not be empty"));
    }

    tracing::debug!(%correlation_id, url = %req.url, "probe received");

    let result = state
        .controller
        .run_probe(
            &req.url,
            req.profile.as_deref(),
            state.settings.probe_timeout,
            state.settings.request_timeout,
        )
        .await;

    match result {
        Ok(media) => {
            info!(%correlation_id, url = %req.url, "probe succeeded");
            Ok(Json(json!({ "success": true, "data": media })))
        }
        Err(failure) => {
            warn!(%correlation_id, url = %req.url, kind = %failure.kind, "probe failed");
            Err(ApiError::from(failure))
        }
    }
}
