//! `GET /health`: never blocks on I/O beyond a stat of the store
//! directory, never requires the API key.

use axum::extract::State;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

pub async fn handle(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "freeDiskBytes": state.store.free_disk_bytes(),
        "downloadDir": state.store.dir().display().to_string(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
