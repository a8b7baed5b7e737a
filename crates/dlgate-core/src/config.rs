//! Runtime configuration, loaded once at startup from process environment
//! into an immutable [`Settings`], then threaded explicitly through every
//! component. No process-wide singletons.

use crate::error::{DlgateError, Result};
use std::time::Duration;

/// Fixed defaults that aren't meant to be tuned per deployment.
pub struct Defaults;

impl Defaults {
    pub const MAX_DURATION_SECONDS: u64 = 7200;
    pub const REAPER_WINDOW_MINUTES: u64 = 30;
    pub const REAPER_TICK_SECONDS: u64 = 300;
    pub const POST_RESPONSE_DELAY_SECONDS: u64 = 60;
    pub const MAX_DOWNLOAD_SIZE_MB: u64 = 1024;
    pub const BIND_ADDRESS: &'static str = "0.0.0.0:8080";
    pub const WORKER_COUNT: usize = 4;
    pub const LOG_LEVEL: &'static str = "info";
    pub const PROBE_TIMEOUT_SECONDS: u64 = 120;
    pub const FETCH_TIMEOUT_SECONDS: u64 = 1800;
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 300;
    pub const DEFAULT_ORDER: &'static str = "tv,ios,cookies,android";
    pub const DEFAULT_PROFILE: &'static str = "tv";
}

/// Process-wide configuration, constructed once in `main` and handed down
/// as `Arc<Settings>`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub download_dir: std::path::PathBuf,
    pub max_download_size_mb: u64,
    pub max_duration_seconds: u64,
    pub reaper_window_minutes: u64,
    pub reaper_tick_seconds: u64,
    pub post_response_delay_seconds: u64,
    pub default_profile: Option<String>,
    pub default_order: Vec<String>,
    pub allow_credential_profile: bool,
    pub credential_blob_base64: Option<String>,
    pub bind_address: String,
    pub worker_count: usize,
    pub log_level: String,
    pub probe_timeout: Duration,
    pub fetch_timeout: Duration,
    pub request_timeout: Duration,
}

impl Settings {
    /// Load configuration from process environment variables.
    ///
    /// `apiKey` is required; everything else falls back to a documented
    /// default on absence, and to that same default (with a warning the
    /// caller should log) on malformed input.
    pub fn from_env() -> Result<Self> {
        let get = |key: &str| std::env::var(key).ok();

        let api_key = get("API_KEY").ok_or_else(|| {
            DlgateError::Config("API_KEY is required and was not set".to_string())
        })?;

        let download_dir = get("DOWNLOAD_DIR")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let max_download_size_mb = parse_or_default(
            get("MAX_DOWNLOAD_SIZE_MB"),
            Defaults::MAX_DOWNLOAD_SIZE_MB,
        );
        let max_duration_seconds = parse_or_default(
            get("MAX_DURATION_SECONDS"),
            Defaults::MAX_DURATION_SECONDS,
        );
        let reaper_window_minutes = parse_or_default(
            get("REAPER_WINDOW_MINUTES"),
            Defaults::REAPER_WINDOW_MINUTES,
        );
        let reaper_tick_seconds = parse_or_default(
            get("REAPER_TICK_SECONDS"),
            Defaults::REAPER_TICK_SECONDS,
        );
        let post_response_delay_seconds = parse_or_default(
            get("POST_RESPONSE_DELAY_SECONDS"),
            Defaults::POST_RESPONSE_DELAY_SECONDS,
        );

        let default_profile = get("DEFAULT_PROFILE")
            .filter(|s| !s.is_empty())
            .or_else(|| Some(Defaults::DEFAULT_PROFILE.to_string()));

        let default_order = get("DEFAULT_ORDER")
            .unwrap_or_else(|| Defaults::DEFAULT_ORDER.to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let allow_credential_profile = get("ALLOW_CREDENTIAL_PROFILE")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);

        let credential_blob_base64 = get("CREDENTIAL_BLOB_BASE64").filter(|s| !s.is_empty());

        let bind_address =
            get("BIND_ADDRESS").unwrap_or_else(|| Defaults::BIND_ADDRESS.to_string());
        let worker_count = parse_or_default(get("WORKER_COUNT"), Defaults::WORKER_COUNT as u64) as usize;
        let log_level = get("LOG_LEVEL").unwrap_or_else(|| Defaults::LOG_LEVEL.to_string());

        let probe_timeout = Duration::from_secs(parse_or_default(
            get("PROBE_TIMEOUT_SECONDS"),
            Defaults::PROBE_TIMEOUT_SECONDS,
        ));
        let fetch_timeout = Duration::from_secs(parse_or_default(
            get("FETCH_TIMEOUT_SECONDS"),
            Defaults::FETCH_TIMEOUT_SECONDS,
        ));
        let request_timeout = Duration::from_secs(parse_or_default(
            get("REQUEST_TIMEOUT_SECONDS"),
            Defaults::REQUEST_TIMEOUT_SECONDS,
        ));

        Ok(Self {
            api_key,
            download_dir,
            max_download_size_mb,
            max_duration_seconds,
            reaper_window_minutes,
            reaper_tick_seconds,
            post_response_delay_seconds,
            default_profile,
            default_order,
            allow_credential_profile,
            credential_blob_base64,
            bind_address,
            worker_count,
            log_level,
            probe_timeout,
            fetch_timeout,
            request_timeout,
        })
    }

    pub fn max_download_size_bytes(&self) -> u64 {
        self.max_download_size_mb * 1024 * 1024
    }

    pub fn reaper_window(&self) -> Duration {
        Duration::from_secs(self.reaper_window_minutes * 60)
    }

    pub fn reaper_tick(&self) -> Duration {
        Duration::from_secs(self.reaper_tick_seconds)
    }

    pub fn post_response_delay(&self) -> Duration {
        Duration::from_secs(self.post_response_delay_seconds)
    }
}

fn parse_or_default(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}

fn parse_bool(raw: &str) -> bool {
    !matches!(raw.to_lowercase().as_str(), "0" | "false" | "no" | "off")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_default_falls_back_on_garbage() {
        assert_eq!(parse_or_default(Some("not-a-number".to_string()), 42), 42);
        assert_eq!(parse_or_default(Some("99".to_string()), 42), 99);
        assert_eq!(parse_or_default(None, 42), 42);
    }

    #[test]
    fn parse_bool_recognises_falsey_strings() {
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("No"));
        assert!(parse_bool("true"));
        assert!(parse_bool("anything-else"));
    }
}
