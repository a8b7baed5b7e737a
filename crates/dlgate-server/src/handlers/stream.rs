//! `POST /api/stream`. True mid-fetch streaming would require the
//! adapter to hand over bytes before the extractor process exits, which
//! `ProcessExtractorAdapter` cannot do (the whole file is materialised on
//! disk first). This degrades to the same fetch-then-stream behaviour as
//! `/api/download` rather than faking incremental delivery.

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use std::sync::Arc;

use super::MediaRequest;
use crate::error_response::ApiError;
use crate::state::AppState;

pub async fn handle(
    state: State<Arc<AppState>>,
    req: Json<MediaRequest>,
) -> Result<Response, ApiError> {
    super::download::handle(state, req).await
}
