//! Failure classification for the model call.
//!
//! Providers report what went wrong as a [`ProviderFailure`]; this module is
//! the only place that decides which [`ErrorKind`] that becomes.

use crate::error::{ClassifiedError, ErrorKind};
use reqwest::StatusCode;

/// Phrases providers use in error bodies when a quota or rate is exhausted
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "resource_exhausted",
    "quota",
];

/// Raw failure observed while calling a model provider
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderFailure {
    /// Provider answered with a non-success status
    Status { status: u16, body: String },
    /// Request never completed (connect error, timeout, reset)
    Transport { message: String, timed_out: bool },
    /// Success status, but the envelope did not have the expected shape
    Envelope { message: String, body: String },
}

impl ProviderFailure {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        ProviderFailure::Status {
            status,
            body: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ProviderFailure::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn envelope(message: impl Into<String>, body: impl Into<String>) -> Self {
        ProviderFailure::Envelope {
            message: message.into(),
            body: body.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderFailure {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ProviderFailure::status(status.as_u16(), err.to_string());
        }
        ProviderFailure::Transport {
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }
}

/// Whether a status/body pair signals rate or quota exhaustion
pub fn is_rate_limit_signal(status: u16, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        return true;
    }
    let body = body.to_ascii_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Map a provider failure onto the taxonomy.
///
/// Rate exhaustion becomes RateLimited; everything else a provider can do
/// wrong is TransientProviderError.
pub fn classify_provider_failure(failure: &ProviderFailure) -> ClassifiedError {
    match failure {
        ProviderFailure::Status { status, body } => {
            let kind = if is_rate_limit_signal(*status, body) {
                ErrorKind::RateLimited
            } else {
                ErrorKind::TransientProviderError
            };
            ClassifiedError::new(kind, format!("provider returned HTTP {status}"))
                .with_raw(body.clone())
        }
        ProviderFailure::Transport { message, timed_out } => {
            if *timed_out {
                ClassifiedError::transient(format!("provider call timed out: {message}"))
            } else {
                ClassifiedError::transient(format!("provider call failed: {message}"))
            }
        }
        ProviderFailure::Envelope { message, body } => {
            if is_rate_limit_signal(0, body) {
                ClassifiedError::rate_limited(format!("provider signalled rate limit: {message}"))
                    .with_raw(body.clone())
            } else {
                ClassifiedError::transient(format!("unexpected provider response: {message}"))
                    .with_raw(body.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_429_is_rate_limited() {
        let err = classify_provider_failure(&ProviderFailure::status(429, "slow down"));
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.raw(), Some("slow down"));
    }

    #[test]
    fn test_rate_limit_body_on_other_status() {
        let body = r#"{"error":{"code":503,"status":"RESOURCE_EXHAUSTED","message":"Quota exceeded"}}"#;
        let err = classify_provider_failure(&ProviderFailure::status(503, body));
        assert_eq!(err.kind(), ErrorKind::RateLimited);

        let err = classify_provider_failure(&ProviderFailure::status(400, "Rate limit reached"));
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn test_other_provider_failures_are_transient() {
        let failures = [
            ProviderFailure::status(500, "internal error"),
            ProviderFailure::status(401, "invalid api key"),
            ProviderFailure::status(503, "model is loading"),
            ProviderFailure::transport("connection refused"),
            ProviderFailure::Transport {
                message: "deadline elapsed".to_string(),
                timed_out: true,
            },
            ProviderFailure::envelope("missing choices", "{}"),
        ];

        for failure in &failures {
            assert_eq!(
                classify_provider_failure(failure).kind(),
                ErrorKind::TransientProviderError,
                "for {failure:?}"
            );
        }
    }

    #[test]
    fn test_envelope_error_with_rate_limit_body() {
        let failure = ProviderFailure::envelope(
            "missing choices",
            r#"{"error":"Rate limit exceeded for model"}"#,
        );
        assert_eq!(
            classify_provider_failure(&failure).kind(),
            ErrorKind::RateLimited
        );
    }
}
