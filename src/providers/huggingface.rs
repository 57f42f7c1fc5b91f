//! Hugging Face hosted inference adapter

use super::{http_client, read_body, ModelProvider};
use crate::analysis::classifier::ProviderFailure;
use crate::config::ProviderConfig;
use crate::error::ClassifiedError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    /// Greedy decoding; the API rejects a literal zero temperature
    do_sample: bool,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// Provider calling `{base_url}/models/{model}`
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HuggingFaceProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ClassifiedError> {
        let client = http_client(config)?;
        let model = config.model_or_default().to_string();

        Ok(Self {
            client,
            endpoint: format!("{}/models/{}", config.base_url_or_default(), model),
            api_key: config.api_key.clone(),
            model,
        })
    }
}

/// Extract `generated_text` of the first generation
pub fn parse_generations(body: &str) -> Result<String, ProviderFailure> {
    let generations: Vec<Generation> = serde_json::from_str(body).map_err(|e| {
        ProviderFailure::envelope(format!("invalid inference envelope: {e}"), body)
    })?;

    generations
        .into_iter()
        .next()
        .map(|g| g.generated_text)
        .ok_or_else(|| ProviderFailure::envelope("inference envelope has no generations", body))
}

#[async_trait]
impl ModelProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderFailure> {
        let request = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                do_sample: false,
                return_full_text: false,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response).await?;
        debug!(model = %self.model, bytes = body.len(), "Inference response received");

        parse_generations(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generations() {
        let body = r#"[{"generated_text":"{\"risk_score\":0.2}"}]"#;
        assert_eq!(parse_generations(body).unwrap(), r#"{"risk_score":0.2}"#);
    }

    #[test]
    fn test_error_object_is_envelope_failure() {
        // HF reports some errors as a 200 with an error object
        let body = r#"{"error":"Rate limit reached. Please log in or use a HF access token"}"#;
        assert!(matches!(
            parse_generations(body),
            Err(ProviderFailure::Envelope { .. })
        ));
        assert!(matches!(
            parse_generations("[]"),
            Err(ProviderFailure::Envelope { .. })
        ));
    }

    #[test]
    fn test_endpoint_includes_model() {
        let config = ProviderConfig {
            kind: crate::config::ProviderKind::Huggingface,
            api_key: "hf_token".to_string(),
            model: Some("mistralai/Mistral-7B-Instruct-v0.2".to_string()),
            base_url: None,
            timeout_ms: 1_000,
        };
        let provider = HuggingFaceProvider::from_config(&config).unwrap();
        assert_eq!(
            provider.endpoint,
            "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.2"
        );
    }
}
