//! Fallback controller, the heart of the system.

use dlgate_core::error::ErrorKind;
use dlgate_core::model::{AttemptRecord, FallbackPlan, FetchCaps, FetchedFile, MediaInfo, ProfileSpec};
use dlgate_core::{CancellationToken, DlgateError, Outcome};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::adapter::{ExtractorAdapter, ProgressEvent};
use crate::credentials::CredentialStore;
use crate::registry::ProfileRegistry;

/// Structured failure returned when a request's fallback plan is
/// exhausted or stopped permanently.
#[derive(Debug)]
pub struct FallbackFailure {
    pub kind: ErrorKind,
    pub attempts: Vec<AttemptRecord>,
}

impl FallbackFailure {
    fn no_profiles() -> Self {
        Self {
            kind: ErrorKind::NoProfilesAvailable,
            attempts: Vec::new(),
        }
    }

    fn permanent(kind: ErrorKind, attempts: Vec<AttemptRecord>) -> Self {
        Self { kind, attempts }
    }

    fn exhausted(attempts: Vec<AttemptRecord>) -> Self {
        Self {
            kind: ErrorKind::Unavailable,
            attempts,
        }
    }

    fn timeout(attempts: Vec<AttemptRecord>) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            attempts,
        }
    }
}

pub struct FallbackController {
    registry: ProfileRegistry,
    credentials: CredentialStore,
    adapter: Arc<dyn ExtractorAdapter>,
}

impl FallbackController {
    pub fn new(
        registry: ProfileRegistry,
        credentials: CredentialStore,
        adapter: Arc<dyn ExtractorAdapter>,
    ) -> Self {
        Self {
            registry,
            credentials,
            adapter,
        }
    }

    fn build_plan(&self, preferred_profile: Option<&str>) -> FallbackPlan {
        let preferred = preferred_profile.and_then(|name| self.registry.get(name));
        dlgate_core::plan::build_plan(
            preferred,
            &self.registry.default_order(),
            self.credentials.is_populated(),
        )
    }

    pub async fn run_probe(
        &self,
        url: &str,
        preferred_profile: Option<&str>,
        probe_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<MediaInfo, FallbackFailure> {
        let plan = self.build_plan(preferred_profile);
        if plan.is_empty() {
            return Err(FallbackFailure::no_profiles());
        }

        let deadline = Instant::now() + request_timeout;
        let mut attempts = Vec::new();

        for profile in &plan.profiles {
            if Instant::now() >= deadline {
                return Err(FallbackFailure::timeout(attempts));
            }

            let credential = match self.acquire_if_needed(profile).await {
                Ok(handle) => handle,
                Err(_) => {
                    attempts.push(AttemptRecord::transient(&profile.name, ErrorKind::AuthRequired, Duration::ZERO));
                    continue;
                }
            };

            let started = Instant::now();
            let outcome = self
                .adapter
                .probe(url, profile, credential.as_ref(), probe_timeout)
                .await;
            let elapsed = started.elapsed();
            drop(credential);

            match outcome {
                Outcome::Ok(info) => {
                    attempts.push(AttemptRecord::ok(&profile.name, elapsed));
                    info!(profile = %profile.name, "probe succeeded");
                    return Ok(info);
                }
                Outcome::Transient(kind, _err) => {
                    attempts.push(AttemptRecord::transient(&profile.name, kind, elapsed));
                    warn!(profile = %profile.name, %kind, "probe failed transiently, advancing");
                }
                Outcome::Permanent(kind, _err) => {
                    attempts.push(AttemptRecord::permanent(&profile.name, kind, elapsed));
                    return Err(FallbackFailure::permanent(kind, attempts));
                }
            }
        }

        Err(FallbackFailure::exhausted(attempts))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn run_fetch(
        &self,
        url: &str,
        preferred_profile: Option<&str>,
        format_selector: &str,
        out_dir: &Path,
        caps: FetchCaps,
        progress: mpsc::Sender<ProgressEvent>,
        fetch_timeout: Duration,
        request_timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<FetchedFile, FallbackFailure> {
        let plan = self.build_plan(preferred_profile);
        if plan.is_empty() {
            return Err(FallbackFailure::no_profiles());
        }

        let deadline = Instant::now() + request_timeout;
        let mut attempts = Vec::new();

        for profile in &plan.profiles {
            if cancel.is_cancelled() {
                return Err(FallbackFailure::exhausted(attempts));
            }
            if Instant::now() >= deadline {
                return Err(FallbackFailure::timeout(attempts));
            }

            let credential = match self.acquire_if_needed(profile).await {
                Ok(handle) => handle,
                Err(_) => {
                    attempts.push(AttemptRecord::transient(&profile.name, ErrorKind::AuthRequired, Duration::ZERO));
                    continue;
                }
            };

            let identifier = fresh_identifier(url);
            let started = Instant::now();
            let outcome = self
                .adapter
                .fetch(
                    url,
                    profile,
                    format_selector,
                    out_dir,
                    &identifier,
                    credential.as_ref(),
                    caps,
                    progress.clone(),
                    fetch_timeout,
                    cancel.clone(),
                )
                .await;
            let elapsed = started.elapsed();
            drop(credential);

            match outcome {
                Outcome::Ok(file) => {
                    attempts.push(AttemptRecord::ok(&profile.name, elapsed));
                    info!(profile = %profile.name, bytes = file.byte_size, "fetch succeeded");
                    return Ok(file);
                }
                Outcome::Transient(kind, err) => {
                    attempts.push(AttemptRecord::transient(&profile.name, kind, elapsed));
                    warn!(profile = %profile.name, %kind, error = %err, "fetch failed transiently, advancing");
                }
                Outcome::Permanent(kind, err) => {
                    attempts.push(AttemptRecord::permanent(&profile.name, kind, elapsed));
                    warn!(profile = %profile.name, %kind, error = %err, "fetch failed permanently, stopping");
                    return Err(FallbackFailure::permanent(kind, attempts));
                }
            }
        }

        Err(FallbackFailure::exhausted(attempts))
    }

    async fn acquire_if_needed(
        &self,
        profile: &ProfileSpec,
    ) -> Result<Option<crate::credentials::CredentialHandle>, DlgateError> {
        if !profile.requires_credentials {
            return Ok(None);
        }
        self.credentials.acquire().await.map(Some)
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }
}

/// Derive a fresh, collision-free 128-bit identifier for a store entry:
/// a hash of the URL plus a monotonic clock sample.
fn fresh_identifier(url: &str) -> String {
    use sha2::{Digest, Sha256};
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ProgressEvent;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedAdapter {
        probe_script: Mutex<Vec<Outcome<MediaInfo>>>,
    }

    fn sample_info() -> MediaInfo {
        MediaInfo {
            url: "U1".to_string(),
            title: Some("T1".to_string()),
            duration: Some(600),
            thumbnail: None,
            uploader: None,
            view_count: None,
            filesize_approx: None,
            extractor: Some("youtube".to_string()),
            format_count: Some(5),
        }
    }

    #[async_trait]
    impl ExtractorAdapter for ScriptedAdapter {
        async fn probe(
            &self,
            _url: &str,
            _profile: &ProfileSpec,
            _credential: Option<&crate::credentials::CredentialHandle>,
            _timeout: Duration,
        ) -> Outcome<MediaInfo> {
            let mut script = self.probe_script.lock().unwrap();
            if script.is_empty() {
                return Outcome::Permanent(
                    ErrorKind::Internal,
                    DlgateError::extract(ErrorKind::Internal, "script exhausted"),
                );
            }
            script.remove(0)
        }

        async fn fetch(
            &self,
            _url: &str,
            _profile: &ProfileSpec,
            _format_selector: &str,
            _out_dir: &Path,
            _identifier: &str,
            _credential: Option<&crate::credentials::CredentialHandle>,
            _caps: FetchCaps,
            _progress: mpsc::Sender<ProgressEvent>,
            _timeout: Duration,
            _cancel: CancellationToken,
        ) -> Outcome<FetchedFile> {
            Outcome::Permanent(
                ErrorKind::Internal,
                DlgateError::extract(ErrorKind::Internal, "not exercised in this test"),
            )
        }
    }

    fn registry_with_order(order: &[&str]) -> ProfileRegistry {
        ProfileRegistry::new(
            &order.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            None,
        )
        .unwrap()
    }

    fn empty_credentials() -> CredentialStore {
        CredentialStore::load(None, std::env::temp_dir().join("dlgate-controller-test"))
    }

    fn err_outcome(kind: ErrorKind) -> Outcome<MediaInfo> {
        Outcome::from_error(DlgateError::extract(kind, "synthetic"))
    }

    #[tokio::test]
    async fn bot_challenge_then_success_advances_and_returns() {
        let adapter = Arc::new(ScriptedAdapter {
            probe_script: Mutex::new(vec![
                err_outcome(ErrorKind::BotChallenge),
                Outcome::Ok(sample_info()),
            ]),
        });
        let controller = FallbackController::new(
            registry_with_order(&["tv", "ios"]),
            empty_credentials(),
            adapter,
        );

        let result = controller
            .run_probe("U2", None, Duration::from_secs(5), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(result.title.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn not_found_stops_immediately_without_trying_next_profile() {
        let adapter = Arc::new(ScriptedAdapter {
            probe_script: Mutex::new(vec![err_outcome(ErrorKind::NotFound)]),
        });
        let controller = FallbackController::new(
            registry_with_order(&["tv", "ios"]),
            empty_credentials(),
            adapter,
        );

        let failure = controller
            .run_probe("U4", None, Duration::from_secs(5), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::NotFound);
        assert_eq!(failure.attempts.len(), 1);
        assert_eq!(failure.attempts[0].profile, "tv");
    }

    #[tokio::test]
    async fn credential_profile_dropped_when_store_empty_exhausts_with_two_attempts() {
        let adapter = Arc::new(ScriptedAdapter {
            probe_script: Mutex::new(vec![
                err_outcome(ErrorKind::Unavailable),
                err_outcome(ErrorKind::Unavailable),
            ]),
        });
        let controller = FallbackController::new(
            registry_with_order(&["tv", "cookies", "android"]),
            empty_credentials(),
            adapter,
        );

        let failure = controller
            .run_probe("U3", None, Duration::from_secs(5), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert_eq!(failure.attempts.len(), 2);
        assert_eq!(failure.attempts[0].profile, "tv");
        assert_eq!(failure.attempts[1].profile, "android");
    }

    #[tokio::test]
    async fn unknown_preferred_profile_behaves_as_if_absent() {
        let adapter = Arc::new(ScriptedAdapter {
            probe_script: Mutex::new(vec![Outcome::Ok(sample_info())]),
        });
        let controller = FallbackController::new(
            registry_with_order(&["tv", "ios"]),
            empty_credentials(),
            adapter,
        );

        let result = controller
            .run_probe("U6", Some("nonsense"), Duration::from_secs(5), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(result.title.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn empty_plan_fails_fast_with_no_profiles_available() {
        let adapter = Arc::new(ScriptedAdapter {
            probe_script: Mutex::new(vec![]),
        });
        // Every configured profile requires credentials and the store is empty.
        let controller = FallbackController::new(
            registry_with_order(&["cookies"]),
            empty_credentials(),
            adapter,
        );

        let failure = controller
            .run_probe("U7", None, Duration::from_secs(5), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::NoProfilesAvailable);
        assert!(failure.attempts.is_empty());
    }

    #[test]
    fn fresh_identifier_is_stable_length_and_varies_over_time() {
        let a = fresh_identifier("same-url");
        std::thread::sleep(Duration::from_millis(2));
        let b = fresh_identifier("same-url");
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
