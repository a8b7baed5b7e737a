//! API key authentication: every non-health endpoint requires
//! `X-API-Key` to match the configured secret, else `401`.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if key == state.settings.api_key => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Unauthorized",
                "message": "missing or invalid X-API-Key header",
            })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                require_api_key,
            ))
            .with_state(state)
    }

    fn test_state(api_key: &str) -> Arc<AppState> {
        let dir = tempfile::tempdir().unwrap().into_path();
        let registry =
            dlgate_extractor::ProfileRegistry::new(&["tv".to_string()], None).unwrap();
        let credentials = dlgate_extractor::CredentialStore::load(None, dir.clone());
        let adapter = std::sync::Arc::new(dlgate_extractor::ProcessExtractorAdapter::new());
        let controller = Arc::new(dlgate_extractor::FallbackController::new(
            registry,
            credentials,
            adapter,
        ));
        Arc::new(AppState {
            settings: Arc::new(test_settings(api_key, dir.clone())),
            controller,
            store: crate::store::DownloadStore::new(dir),
        })
    }

    // Built directly rather than via `Settings::from_env` so parallel test
    // threads don't race on shared process environment variables.
    fn test_settings(api_key: &str, dir: std::path::PathBuf) -> dlgate_core::Settings {
        dlgate_core::Settings {
            api_key: api_key.to_string(),
            download_dir: dir,
            max_download_size_mb: dlgate_core::config::Defaults::MAX_DOWNLOAD_SIZE_MB,
            max_duration_seconds: dlgate_core::config::Defaults::MAX_DURATION_SECONDS,
            reaper_window_minutes: dlgate_core::config::Defaults::REAPER_WINDOW_MINUTES,
            reaper_tick_seconds: dlgate_core::config::Defaults::REAPER_TICK_SECONDS,
            post_response_delay_seconds: dlgate_core::config::Defaults::POST_RESPONSE_DELAY_SECONDS,
            default_profile: Some(dlgate_core::config::Defaults::DEFAULT_PROFILE.to_string()),
            default_order: vec!["tv".to_string()],
            allow_credential_profile: true,
            credential_blob_base64: None,
            bind_address: "127.0.0.1:0".to_string(),
            worker_count: dlgate_core::config::Defaults::WORKER_COUNT,
            log_level: dlgate_core::config::Defaults::LOG_LEVEL.to_string(),
            probe_timeout: std::time::Duration::from_secs(
                dlgate_core::config::Defaults::PROBE_TIMEOUT_SECONDS,
            ),
            fetch_timeout: std::time::Duration::from_secs(
                dlgate_core::config::Defaults::FETCH_TIMEOUT_SECONDS,
            ),
            request_timeout: std::time::Duration::from_secs(
                dlgate_core::config::Defaults::REQUEST_TIMEOUT_SECONDS,
            ),
        }
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let app = router(test_state("secret"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn matching_header_is_accepted() {
        let app = router(test_state("secret"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("X-API-Key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let app = router(test_state("secret"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("X-API-Key", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
