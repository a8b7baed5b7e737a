//! `POST /api/download`: runs the fallback fetch, then streams the
//! resulting file, then schedules eager deletion.

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dlgate_core::model::FetchCaps;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{info, warn};
use uuid::Uuid;

use super::MediaRequest;
use crate::error_response::ApiError;
use crate::reaper;
use crate::state::AppState;

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MediaRequest>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4();
    if req.url.trim().is_empty() {
        return Err(ApiError::bad_request("url must not be empty"));
    }

    state
        .store
        .ensure_exists()
        .await
        .map_err(|e| ApiError::bad_request(format!("download directory unavailable: {e}")))?;

    let caps = FetchCaps {
        max_duration_seconds: req
            .max_duration_seconds
            .unwrap_or(state.settings.max_duration_seconds),
        max_size_bytes: state.settings.max_download_size_bytes(),
    };
    let format_selector = req.format.as_deref().unwrap_or("best");

    let (progress_tx, mut progress_rx) = mpsc::channel(16);
    tokio::spawn(async move { while progress_rx.recv().await.is_some() {} });

    tracing::debug!(%correlation_id, url = %req.url, "download received");

    let fetched = state
        .controller
        .run_fetch(
            &req.url,
            req.profile.as_deref(),
            format_selector,
            state.store.dir(),
            caps,
            progress_tx,
            state.settings.fetch_timeout,
            state.settings.request_timeout,
            dlgate_core::CancellationToken::new(),
        )
        .await
        .map_err(|failure| {
            warn!(%correlation_id, url = %req.url, kind = %failure.kind, "download failed");
            ApiError::from(failure)
        })?;

    info!(%correlation_id, url = %req.url, bytes = fetched.byte_size, "download succeeded");

    let file = tokio::fs::File::open(&fetched.path)
        .await
        .map_err(|e| ApiError::bad_request(format!("could not open fetched file: {e}")))?;
    let body = Body::from_stream(FramedRead::new(file, BytesCodec::new()));

    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename::sanitize(&fetched.suggested_filename)
    );

    reaper::schedule_eager_deletion(
        state.store.clone(),
        fetched.path.clone(),
        state.settings.post_response_delay(),
    );

    let response = Response::builder()
        .header(header::CONTENT_TYPE, fetched.mime_type)
        .header(header::CONTENT_LENGTH, fetched.byte_size)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header("X-Request-Id", correlation_id.to_string())
        .body(body)
        .expect("response builder with validated header values");

    Ok(response)
}
