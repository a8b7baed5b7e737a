//! Domain model shared by the extractor and server crates.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Immutable snapshot returned by a probe. Every field but `url` is
/// optional: upstream sites routinely omit one or more of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize_approx: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_count: Option<u32>,
}

/// Quality ceiling a profile is willing to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityCeiling {
    Hd,
    Sd360p,
}

/// A named player-client impersonation strategy.
///
/// `impersonation` is opaque to the controller; only the adapter
/// interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSpec {
    pub name: String,
    pub quality_ceiling: QualityCeilingRepr,
    pub requires_credentials: bool,
    pub impersonation: ImpersonationTarget,
}

/// Serializable mirror of [`QualityCeiling`] kept on `ProfileSpec` so the
/// registry can construct specs from plain config strings without an
/// intermediate parse step living outside this module.
pub type QualityCeilingRepr = QualityCeiling;

/// Upstream client impersonation parameters, one variant per supported
/// extractor "player client". Exhaustively matched by the adapter; never
/// looked up by string at the hot path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImpersonationTarget {
    /// Android TV client: highest tolerance for bot checks, capped quality.
    Tv,
    /// iOS client: good HLS access, moderate quality.
    Ios,
    /// Android client.
    Android,
    /// Mobile web client.
    MobileWeb,
    /// Desktop web client: best quality, most scrutinised by anti-bot.
    Web,
    /// Authenticated session using a materialised credential file.
    Cookies,
}

/// Ordered, deduplicated sequence of profiles to try for one request.
#[derive(Debug, Clone, Default)]
pub struct FallbackPlan {
    pub profiles: Vec<ProfileSpec>,
}

impl FallbackPlan {
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }
}

/// One profile attempt within a request, accumulated into the response on
/// failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub profile: String,
    pub outcome: AttemptOutcome,
    pub kind: Option<ErrorKind>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Ok,
    Transient,
    Permanent,
}

impl AttemptRecord {
    pub fn ok(profile: &str, elapsed: Duration) -> Self {
        Self {
            profile: profile.to_string(),
            outcome: AttemptOutcome::Ok,
            kind: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn transient(profile: &str, kind: ErrorKind, elapsed: Duration) -> Self {
        Self {
            profile: profile.to_string(),
            outcome: AttemptOutcome::Transient,
            kind: Some(kind),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn permanent(profile: &str, kind: ErrorKind, elapsed: Duration) -> Self {
        Self {
            profile: profile.to_string(),
            outcome: AttemptOutcome::Permanent,
            kind: Some(kind),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// A file written into the download store, owned by the handler until
/// streamed, after which ownership passes to the reaper.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub mime_type: String,
    pub suggested_filename: String,
    pub byte_size: u64,
    pub identifier: String,
}

/// Caps applied to a single fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchCaps {
    pub max_duration_seconds: u64,
    pub max_size_bytes: u64,
}
