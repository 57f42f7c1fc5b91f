//! Generative model provider adapters
//!
//! Each adapter knows one provider's request shape and response envelope.
//! Prompt rendering, normalization, validation and classification are
//! shared and live in [`crate::analysis`].

pub mod huggingface;
pub mod openai;

pub use huggingface::HuggingFaceProvider;
pub use openai::OpenAiCompatibleProvider;

use crate::analysis::classifier::ProviderFailure;
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ClassifiedError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One round trip to a hosted generative model.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Model identifier sent with each request
    fn model(&self) -> &str;

    /// Send the prompt with deterministic sampling and return the reply text.
    ///
    /// Exactly one outbound request per call; no retries.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderFailure>;
}

/// Build the adapter selected by configuration.
///
/// Fails with ConfigurationError, never per request.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ModelProvider>, ClassifiedError> {
    let provider: Arc<dyn ModelProvider> = match config.kind {
        ProviderKind::OpenaiCompatible => Arc::new(OpenAiCompatibleProvider::from_config(config)?),
        ProviderKind::Huggingface => Arc::new(HuggingFaceProvider::from_config(config)?),
    };

    info!(
        provider = provider.name(),
        model = provider.model(),
        "Model provider initialized"
    );
    Ok(provider)
}

/// Shared client construction and credential checks for adapters
pub(crate) fn http_client(config: &ProviderConfig) -> Result<reqwest::Client, ClassifiedError> {
    config.check()?;

    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()
        .map_err(|e| ClassifiedError::configuration(format!("failed to build HTTP client: {e}")))
}

/// Read the body of a provider response, turning non-2xx into a failure
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, ProviderFailure> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(ProviderFailure::status(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn provider_config(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            kind,
            api_key: "testkey".to_string(),
            model: None,
            base_url: None,
            timeout_ms: 1_000,
        }
    }

    #[test]
    fn test_build_provider_by_kind() {
        let provider = build_provider(&provider_config(ProviderKind::OpenaiCompatible)).unwrap();
        assert_eq!(provider.name(), "openai-compatible");
        assert_eq!(provider.model(), "gemini-2.0-flash");

        let provider = build_provider(&provider_config(ProviderKind::Huggingface)).unwrap();
        assert_eq!(provider.name(), "huggingface");
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let mut config = provider_config(ProviderKind::OpenaiCompatible);
        config.api_key = String::new();

        let err = build_provider(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_blank_model_is_configuration_error() {
        let mut config = provider_config(ProviderKind::OpenaiCompatible);
        config.model = Some(String::new());

        let err = build_provider(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let mut config = provider_config(ProviderKind::Huggingface);
        config.base_url = Some("::not a url::".to_string());

        let err = build_provider(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }
}
