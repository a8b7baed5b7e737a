//! Error taxonomy shared by every crate in the workspace.
//!
//! `ErrorKind` is the closed set of symbolic failure reasons; `DlgateError`
//! is what operations actually return, carrying a human message and, where
//! it exists, the underlying cause. The adapter tags every `DlgateError`
//! with an `Outcome` so the controller never has to re-derive advance/stop
//! behaviour from the kind itself.

use std::path::PathBuf;
use thiserror::Error;

/// The closed set of symbolic error kinds surfaced to clients and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    BotChallenge,
    Unavailable,
    Throttled,
    AuthRequired,
    NotFound,
    GeoBlocked,
    TooLong,
    TooLarge,
    BadFormat,
    AmbiguousInput,
    NoProfilesAvailable,
    NoSpace,
    Timeout,
    Unauthorized,
    BadRequest,
    Internal,
}

impl ErrorKind {
    /// Whether an adapter error of this kind should advance to the next
    /// profile (`true`) or stop the fallback immediately (`false`).
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::BotChallenge
                | ErrorKind::Unavailable
                | ErrorKind::Throttled
                | ErrorKind::AuthRequired
        )
    }

    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Unauthorized => 401,
            ErrorKind::BadRequest | ErrorKind::TooLong | ErrorKind::AmbiguousInput => 400,
            ErrorKind::NotFound | ErrorKind::GeoBlocked => 404,
            ErrorKind::TooLarge => 413,
            ErrorKind::BadFormat => 415,
            ErrorKind::NoProfilesAvailable
            | ErrorKind::BotChallenge
            | ErrorKind::Unavailable
            | ErrorKind::Throttled
            | ErrorKind::AuthRequired => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::NoSpace | ErrorKind::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::BotChallenge => "BotChallenge",
            ErrorKind::Unavailable => "Unavailable",
            ErrorKind::Throttled => "Throttled",
            ErrorKind::AuthRequired => "AuthRequired",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::GeoBlocked => "GeoBlocked",
            ErrorKind::TooLong => "TooLong",
            ErrorKind::TooLarge => "TooLarge",
            ErrorKind::BadFormat => "BadFormat",
            ErrorKind::AmbiguousInput => "AmbiguousInput",
            ErrorKind::NoProfilesAvailable => "NoProfilesAvailable",
            ErrorKind::NoSpace => "NoSpace",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(s)
    }
}

/// Main error type for the dlgate workspace.
#[derive(Debug, Error)]
pub enum DlgateError {
    #[error("{kind}: {message}")]
    Extract { kind: ErrorKind, message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl DlgateError {
    pub fn extract(kind: ErrorKind, message: impl Into<String>) -> Self {
        DlgateError::Extract {
            kind,
            message: message.into(),
        }
    }

    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        DlgateError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// The symbolic kind this error maps to, for HTTP status/body purposes.
    /// Anything not produced by the adapter is classified `Internal` and
    /// never exposes its cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DlgateError::Extract { kind, .. } => *kind,
            DlgateError::Config(_) => ErrorKind::BadRequest,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for DlgateError {
    fn from(err: std::io::Error) -> Self {
        DlgateError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for DlgateError {
    fn from(err: serde_json::Error) -> Self {
        DlgateError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, DlgateError>;

/// Outcome of a single adapter call, tagged by kind so the controller can
/// exhaustively match on advance-vs-stop behaviour instead of doing a
/// string lookup at the hot path.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Transient(ErrorKind, DlgateError),
    Permanent(ErrorKind, DlgateError),
}

impl<T> Outcome<T> {
    /// Build an Outcome from a raw `DlgateError`, consulting
    /// `ErrorKind::is_transient` for the advance/stop classification.
    pub fn from_error(err: DlgateError) -> Outcome<T> {
        let kind = err.kind();
        if kind.is_transient() {
            Outcome::Transient(kind, err)
        } else {
            Outcome::Permanent(kind, err)
        }
    }
}
