//! Extractor adapter.
//!
//! Wraps the external extraction binary behind a narrow async interface
//! and translates its exceptions/exit-codes/stderr into the workspace's
//! closed `ErrorKind` taxonomy. Nothing above this module ever sees a raw
//! process exit code or stderr line.

use async_trait::async_trait;
use dlgate_core::error::{DlgateError, ErrorKind};
use dlgate_core::model::{FetchCaps, FetchedFile, MediaInfo, ProfileSpec};
use dlgate_core::Outcome;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::credentials::CredentialHandle;

/// Progress events published on a bounded channel; the handler consumes
/// them non-blockingly and never calls user code from the download task
/// directly.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started,
    Milestone { percent: u8 },
    Completed,
    Failed { kind: ErrorKind },
}

/// Narrow interface to the extraction engine.
#[async_trait]
pub trait ExtractorAdapter: Send + Sync {
    async fn probe(
        &self,
        url: &str,
        profile: &ProfileSpec,
        credential: Option<&CredentialHandle>,
        timeout: Duration,
    ) -> Outcome<MediaInfo>;

    #[allow(clippy::too_many_arguments)]
    async fn fetch(
        &self,
        url: &str,
        profile: &ProfileSpec,
        format_selector: &str,
        out_dir: &Path,
        identifier: &str,
        credential: Option<&CredentialHandle>,
        caps: FetchCaps,
        progress: mpsc::Sender<ProgressEvent>,
        timeout: Duration,
        cancel: dlgate_core::CancellationToken,
    ) -> Outcome<FetchedFile>;
}

/// Adapter implementation that shells out to the extraction binary
/// (conventionally `yt-dlp`, configurable via `EXTRACTOR_BIN`).
pub struct ProcessExtractorAdapter {
    binary: String,
}

impl Default for ProcessExtractorAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessExtractorAdapter {
    pub fn new() -> Self {
        let binary = std::env::var("EXTRACTOR_BIN").unwrap_or_else(|_| "yt-dlp".to_string());
        Self { binary }
    }

    fn client_args(&self, profile: &ProfileSpec, credential: Option<&CredentialHandle>) -> Vec<String> {
        use dlgate_core::model::ImpersonationTarget;

        let mut args = match profile.impersonation {
            ImpersonationTarget::Tv => vec!["--extractor-args", "youtube:player_client=tv"],
            ImpersonationTarget::Ios => vec!["--extractor-args", "youtube:player_client=ios"],
            ImpersonationTarget::Android => vec!["--extractor-args", "youtube:player_client=android"],
            ImpersonationTarget::MobileWeb => vec!["--extractor-args", "youtube:player_client=mweb"],
            ImpersonationTarget::Web => vec!["--extractor-args", "youtube:player_client=web"],
            ImpersonationTarget::Cookies => vec!["--extractor-args", "youtube:player_client=web"],
        }
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

        if let Some(handle) = credential {
            args.push("--cookies".to_string());
            args.push(handle.path().to_string_lossy().into_owned());
        }

        args
    }

    async fn run_probe_process(
        &self,
        url: &str,
        profile: &ProfileSpec,
        credential: Option<&CredentialHandle>,
        timeout: Duration,
    ) -> Result<MediaInfo, (ErrorKind, String)> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--dump-json")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .args(self.client_args(profile, credential))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = run_with_timeout(cmd, timeout).await?;
        parse_probe_output(url, &output.stdout, &output.stderr, output.success)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_fetch_process(
        &self,
        url: &str,
        profile: &ProfileSpec,
        format_selector: &str,
        out_dir: &Path,
        identifier: &str,
        credential: Option<&CredentialHandle>,
        caps: FetchCaps,
        progress: mpsc::Sender<ProgressEvent>,
        timeout: Duration,
        cancel: dlgate_core::CancellationToken,
    ) -> Result<FetchedFile, (ErrorKind, String)> {
        let output_template = out_dir.join(format!("{identifier}.%(ext)s"));

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--newline")
            .arg("-f")
            .arg(format_selector)
            .arg("-o")
            .arg(&output_template)
            .args(self.client_args(profile, credential))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let _ = progress.try_send(ProgressEvent::Started);

        let mut child = cmd.spawn().map_err(|e| {
            (
                ErrorKind::Internal,
                format!("failed to spawn extractor process: {e}"),
            )
        })?;

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let progress_clone = progress.clone();
        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut last_bucket = 0u8;
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = parse_percent(&line) {
                    let bucket = milestone_bucket(percent);
                    if bucket > last_bucket {
                        last_bucket = bucket;
                        let _ = progress_clone.try_send(ProgressEvent::Milestone { percent: bucket });
                    }
                }
            }
        });

        let mut stderr_text = String::new();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let stderr_task = async {
            while let Ok(Some(line)) = stderr_lines.next_line().await {
                stderr_text.push_str(&line);
                stderr_text.push('\n');
            }
        };

        let wait_result = tokio::select! {
            status = child.wait() => status.map_err(|e| (ErrorKind::Internal, e.to_string())),
            () = tokio::time::sleep(timeout) => {
                let _ = child.start_kill();
                Err((ErrorKind::Unavailable, format!("extractor timed out after {timeout:?}")))
            }
            () = cancel.cancelled() => {
                let _ = child.start_kill();
                Err((ErrorKind::Internal, "request cancelled by client disconnect".to_string()))
            }
        };
        stderr_task.await;
        let _ = stdout_task.await;

        let status = match wait_result {
            Ok(status) => status,
            Err((kind, message)) => {
                remove_partial_output(out_dir, identifier).await;
                let _ = progress.try_send(ProgressEvent::Failed { kind });
                return Err((kind, message));
            }
        };

        if !status.success() {
            remove_partial_output(out_dir, identifier).await;
            let (kind, message) = classify_stderr(&stderr_text);
            let _ = progress.try_send(ProgressEvent::Failed { kind });
            return Err((kind, message));
        }

        match locate_output_file(out_dir, identifier).await {
            Some(path) => {
                let meta = tokio::fs::metadata(&path)
                    .await
                    .map_err(|e| (ErrorKind::Internal, e.to_string()))?;
                let byte_size = meta.len();

                if byte_size > caps.max_size_bytes {
                    let _ = tokio::fs::remove_file(&path).await;
                    let _ = progress.try_send(ProgressEvent::Failed {
                        kind: ErrorKind::TooLarge,
                    });
                    return Err((ErrorKind::TooLarge, "fetched file exceeded size cap".to_string()));
                }

                let mime_type = mime_for_extension(path.extension().and_then(|e| e.to_str()));
                let _ = progress.try_send(ProgressEvent::Completed);
                Ok(FetchedFile {
                    path,
                    mime_type,
                    suggested_filename: sanitize_filename::sanitize(url),
                    byte_size,
                    identifier: identifier.to_string(),
                })
            }
            None => {
                let _ = progress.try_send(ProgressEvent::Failed {
                    kind: ErrorKind::Internal,
                });
                Err((
                    ErrorKind::Internal,
                    "extractor reported success but produced no output file".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl ExtractorAdapter for ProcessExtractorAdapter {
    async fn probe(
        &self,
        url: &str,
        profile: &ProfileSpec,
        credential: Option<&CredentialHandle>,
        timeout: Duration,
    ) -> Outcome<MediaInfo> {
        match self.run_probe_process(url, profile, credential, timeout).await {
            Ok(info) => Outcome::Ok(info),
            Err((kind, message)) => Outcome::from_error(DlgateError::extract(kind, message)),
        }
    }

    async fn fetch(
        &self,
        url: &str,
        profile: &ProfileSpec,
        format_selector: &str,
        out_dir: &Path,
        identifier: &str,
        credential: Option<&CredentialHandle>,
        caps: FetchCaps,
        progress: mpsc::Sender<ProgressEvent>,
        timeout: Duration,
        cancel: dlgate_core::CancellationToken,
    ) -> Outcome<FetchedFile> {
        if caps.max_duration_seconds > 0 {
            if let Outcome::Ok(info) = self
                .probe(url, profile, credential, timeout.min(Duration::from_secs(30)))
                .await
            {
                if let Some(duration) = info.duration {
                    if duration > caps.max_duration_seconds {
                        return Outcome::Permanent(
                            ErrorKind::TooLong,
                            DlgateError::extract(ErrorKind::TooLong, "probed duration exceeds cap"),
                        );
                    }
                }
                if let Some(approx) = info.filesize_approx {
                    if approx > caps.max_size_bytes {
                        return Outcome::Permanent(
                            ErrorKind::TooLarge,
                            DlgateError::extract(ErrorKind::TooLarge, "approximate size exceeds cap"),
                        );
                    }
                }
            }
        }

        match self
            .run_fetch_process(
                url,
                profile,
                format_selector,
                out_dir,
                identifier,
                credential,
                caps,
                progress,
                timeout,
                cancel,
            )
            .await
        {
            Ok(file) => Outcome::Ok(file),
            Err((kind, message)) => Outcome::from_error(DlgateError::extract(kind, message)),
        }
    }
}

struct ProcessOutput {
    success: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

async fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<ProcessOutput, (ErrorKind, String)> {
    let child = cmd
        .spawn()
        .map_err(|e| (ErrorKind::Internal, format!("failed to spawn extractor process: {e}")))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ProcessOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        }),
        Ok(Err(e)) => Err((ErrorKind::Internal, e.to_string())),
        Err(_) => Err((ErrorKind::Unavailable, format!("extractor timed out after {timeout:?}"))),
    }
}

fn parse_probe_output(
    url: &str,
    stdout: &[u8],
    stderr: &[u8],
    success: bool,
) -> Result<MediaInfo, (ErrorKind, String)> {
    if !success {
        let stderr_text = String::from_utf8_lossy(stderr);
        return Err(classify_stderr(&stderr_text));
    }

    let value: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| (ErrorKind::Internal, format!("could not parse extractor JSON: {e}")))?;

    if value.get("_type").and_then(|v| v.as_str()) == Some("playlist") {
        return Err((
            ErrorKind::AmbiguousInput,
            "url resolved to a playlist, not a single video".to_string(),
        ));
    }

    Ok(MediaInfo {
        url: url.to_string(),
        title: value.get("title").and_then(|v| v.as_str()).map(String::from),
        duration: value.get("duration").and_then(|v| v.as_f64()).map(|d| d as u64),
        thumbnail: value.get("thumbnail").and_then(|v| v.as_str()).map(String::from),
        uploader: value.get("uploader").and_then(|v| v.as_str()).map(String::from),
        view_count: value.get("view_count").and_then(|v| v.as_u64()),
        filesize_approx: value
            .get("filesize_approx")
            .and_then(|v| v.as_u64())
            .or_else(|| value.get("filesize").and_then(|v| v.as_u64())),
        extractor: value.get("extractor").and_then(|v| v.as_str()).map(String::from),
        format_count: value
            .get("formats")
            .and_then(|v| v.as_array())
            .map(|a| a.len() as u32),
    })
}

/// Classify a failed run's stderr into a symbolic kind. This is the only
/// place in the workspace that pattern-matches on the engine's own
/// strings; everything above this function sees only `ErrorKind`.
fn classify_stderr(stderr: &str) -> (ErrorKind, String) {
    static PATTERNS: OnceLock<Vec<(Regex, ErrorKind)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"(?i)sign in to confirm|not a bot|confirm you.?re a human").unwrap(), ErrorKind::BotChallenge),
            (Regex::new(r"(?i)429|too many requests|rate.?limit").unwrap(), ErrorKind::Throttled),
            (Regex::new(r"(?i)sign in|login required|private video|members.?only").unwrap(), ErrorKind::AuthRequired),
            (Regex::new(r"(?i)video unavailable|has been removed|does not exist|deleted by the uploader").unwrap(), ErrorKind::NotFound),
            (Regex::new(r"(?i)not available in your country|blocked it in your country|geo.?restrict").unwrap(), ErrorKind::GeoBlocked),
            (Regex::new(r"(?i)requested format (is )?not available|format.*not available").unwrap(), ErrorKind::BadFormat),
            (Regex::new(r"(?i)no space left on device|enospc|disk quota exceeded|not enough (free )?(disk )?space").unwrap(), ErrorKind::NoSpace),
            (Regex::new(r"(?i)http error 5\d\d|unable to download webpage|connection reset|temporary failure").unwrap(), ErrorKind::Unavailable),
        ]
    });

    for (pattern, kind) in patterns {
        if pattern.is_match(stderr) {
            return (*kind, stderr.trim().to_string());
        }
    }

    (ErrorKind::Unavailable, stderr.trim().to_string())
}

fn parse_percent(line: &str) -> Option<u8> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)%").unwrap());
    re.captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .map(|p| p.clamp(0.0, 100.0) as u8)
}

fn milestone_bucket(percent: u8) -> u8 {
    match percent {
        0..=24 => 0,
        25..=49 => 25,
        50..=74 => 50,
        75..=99 => 75,
        _ => 100,
    }
}

/// Delete any partial output the extractor left behind for `identifier`.
/// Called on every non-success exit path; a no-op if nothing was written.
/// Safe to call unconditionally since it only ever targets this request's
/// own identifier.
async fn remove_partial_output(out_dir: &Path, identifier: &str) {
    if let Some(path) = locate_output_file(out_dir, identifier).await {
        let _ = tokio::fs::remove_file(&path).await;
    }
}

async fn locate_output_file(out_dir: &Path, identifier: &str) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(out_dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(identifier) {
            return Some(entry.path());
        }
    }
    None
}

fn mime_for_extension(ext: Option<&str>) -> String {
    match ext.map(str::to_lowercase).as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("m4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("opus") => "audio/opus",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bot_challenge() {
        let (kind, _) = classify_stderr("ERROR: [youtube] Sign in to confirm you're not a bot");
        assert_eq!(kind, ErrorKind::BotChallenge);
    }

    #[test]
    fn classifies_throttled() {
        let (kind, _) = classify_stderr("HTTP Error 429: Too Many Requests");
        assert_eq!(kind, ErrorKind::Throttled);
    }

    #[test]
    fn classifies_not_found() {
        let (kind, _) = classify_stderr("ERROR: [youtube] abc123: Video unavailable");
        assert_eq!(kind, ErrorKind::NotFound);
    }

    #[test]
    fn classifies_geo_blocked() {
        let (kind, _) = classify_stderr("ERROR: The uploader has not made this video available in your country");
        assert_eq!(kind, ErrorKind::GeoBlocked);
    }

    #[test]
    fn classifies_bad_format() {
        let (kind, _) = classify_stderr("ERROR: Requested format is not available");
        assert_eq!(kind, ErrorKind::BadFormat);
    }

    #[test]
    fn classifies_no_space() {
        let (kind, _) = classify_stderr("ERROR: [download] Unable to write data: [Errno 28] No space left on device");
        assert_eq!(kind, ErrorKind::NoSpace);
    }

    #[test]
    fn classifies_auth_required() {
        let (kind, _) = classify_stderr("ERROR: Private video. Sign in if you've been granted access");
        assert_eq!(kind, ErrorKind::AuthRequired);
    }

    #[test]
    fn unrecognised_stderr_classifies_unavailable() {
        let (kind, _) = classify_stderr("some completely novel failure message");
        assert_eq!(kind, ErrorKind::Unavailable);
    }

    #[test]
    fn milestone_bucket_rounds_down() {
        assert_eq!(milestone_bucket(10), 0);
        assert_eq!(milestone_bucket(30), 25);
        assert_eq!(milestone_bucket(60), 50);
        assert_eq!(milestone_bucket(90), 75);
        assert_eq!(milestone_bucket(100), 100);
    }

    #[test]
    fn parse_percent_extracts_from_ytdlp_line() {
        let line = "[download]  42.5% of 10.00MiB at 1.00MiB/s ETA 00:05";
        assert_eq!(parse_percent(line), Some(42));
    }

    #[test]
    fn playlist_response_is_ambiguous_input() {
        let stdout = br#"{"_type": "playlist", "title": "whatever"}"#;
        let result = parse_probe_output("http://example.invalid/u", stdout, b"", true);
        assert!(matches!(result, Err((ErrorKind::AmbiguousInput, _))));
    }

    #[test]
    fn single_video_probe_parses_fields() {
        let stdout = br#"{"title": "T1", "duration": 600.0, "view_count": 42, "extractor": "youtube", "formats": [1,2,3]}"#;
        let info = parse_probe_output("U1", stdout, b"", true).unwrap();
        assert_eq!(info.title.as_deref(), Some("T1"));
        assert_eq!(info.duration, Some(600));
        assert_eq!(info.format_count, Some(3));
    }
}
