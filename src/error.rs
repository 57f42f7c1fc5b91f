//! Error types shared across the risk pipeline

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Closed taxonomy of analysis failures.
///
/// The HTTP layer maps each kind to a response code; the pipeline itself
/// never retries on any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Provider reported request-rate or quota exhaustion
    RateLimited,
    /// Any other provider-side failure (HTTP error, timeout, bad envelope)
    TransientProviderError,
    /// The model replied, but the text is not a valid risk analysis
    MalformedOutput,
    /// Credentials or model settings are missing or invalid (startup only)
    ConfigurationError,
}

impl ErrorKind {
    /// Stable snake_case name, used for log fields and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::TransientProviderError => "transient_provider_error",
            ErrorKind::MalformedOutput => "malformed_output",
            ErrorKind::ConfigurationError => "configuration_error",
        }
    }

    /// Whether a caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::TransientProviderError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure tagged with its cause for caller-side routing.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    raw: Option<String>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raw: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientProviderError, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedOutput, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationError, message)
    }

    /// Attach the raw upstream payload for diagnostics
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

/// Reasons an inbound transaction is rejected before analysis
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("timestamp must be RFC3339, got {0:?}")]
    InvalidTimestamp(String),

    #[error("amount must be a positive number, got {0}")]
    NonPositiveAmount(f64),

    #[error("currency must be a 3-letter ISO code, got {0:?}")]
    InvalidCurrency(String),

    #[error("country must be a 2-letter code, got {0:?}")]
    InvalidCountry(String),

    #[error("merchant reputation must be within [0, 1], got {0}")]
    ReputationOutOfRange(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::TransientProviderError.is_retryable());
        assert!(!ErrorKind::MalformedOutput.is_retryable());
        assert!(!ErrorKind::ConfigurationError.is_retryable());
    }

    #[test]
    fn test_classified_error_display_and_raw() {
        let err = ClassifiedError::malformed("not json").with_raw("hello there");

        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
        assert_eq!(err.to_string(), "malformed_output: not json");
        assert_eq!(err.raw(), Some("hello there"));
    }
}
