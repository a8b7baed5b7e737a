//! Maps controller/adapter failures onto the HTTP error body format:
//! `{error, message, attempts}`, with `attempts` present only for
//! fallback failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dlgate_core::error::ErrorKind;
use dlgate_core::model::{AttemptOutcome, AttemptRecord};
use dlgate_extractor::FallbackFailure;
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<Vec<AttemptRecord>>,
}

pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: Option<Vec<AttemptRecord>>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::BadRequest,
            message: message.into(),
            attempts: None,
        }
    }
}

impl From<FallbackFailure> for ApiError {
    fn from(failure: FallbackFailure) -> Self {
        let message = failure_message(&failure);
        Self {
            kind: failure.kind,
            message,
            attempts: Some(failure.attempts),
        }
    }
}

/// A permanent stop (the last attempt's outcome is `Permanent`) means the
/// plan was abandoned after that one profile, not tried to exhaustion, so
/// the message must name the kind rather than imply every profile ran.
fn failure_message(failure: &FallbackFailure) -> String {
    let stopped_permanently = matches!(
        failure.attempts.last(),
        Some(AttemptRecord {
            outcome: AttemptOutcome::Permanent,
            ..
        })
    );

    match failure.kind {
        ErrorKind::NoProfilesAvailable => {
            "no profiles available: every candidate requires credentials that are not configured"
                .to_string()
        }
        _ if failure.attempts.is_empty() || stopped_permanently => failure.kind.to_string(),
        _ => format!(
            "fallback plan exhausted after {} attempt(s)",
            failure.attempts.len()
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.kind.to_string(),
            message: self.message,
            attempts: self.attempts,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn permanent_stop_after_first_profile_does_not_claim_exhaustion() {
        let failure = FallbackFailure {
            kind: ErrorKind::NotFound,
            attempts: vec![AttemptRecord::permanent("tv", ErrorKind::NotFound, Duration::ZERO)],
        };
        let message = failure_message(&failure);
        assert_eq!(message, "NotFound");
    }

    #[test]
    fn transient_attempts_exhausting_every_profile_names_exhaustion() {
        let failure = FallbackFailure {
            kind: ErrorKind::Unavailable,
            attempts: vec![
                AttemptRecord::transient("tv", ErrorKind::Unavailable, Duration::ZERO),
                AttemptRecord::transient("ios", ErrorKind::Unavailable, Duration::ZERO),
            ],
        };
        let message = failure_message(&failure);
        assert_eq!(message, "fallback plan exhausted after 2 attempt(s)");
    }

    #[test]
    fn no_profiles_available_has_its_own_message() {
        let failure = FallbackFailure {
            kind: ErrorKind::NoProfilesAvailable,
            attempts: Vec::new(),
        };
        let message = failure_message(&failure);
        assert!(message.starts_with("no profiles available"));
    }
}
