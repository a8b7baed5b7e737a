pub mod download;
pub mod health;
pub mod info;
pub mod stream;

use serde::Deserialize;

/// Shared request body for `/api/info`, `/api/download`, and `/api/stream`.
/// `format` and `maxDurationSeconds` are ignored by `/api/info`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRequest {
    pub url: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_duration_seconds: Option<u64>,
}
