//! Chat-completions adapter (Gemini OpenAI-compatible endpoint, OpenAI)

use super::{http_client, read_body, ModelProvider};
use crate::analysis::classifier::ProviderFailure;
use crate::analysis::prompt::SYSTEM_INSTRUCTION;
use crate::config::ProviderConfig;
use crate::error::ClassifiedError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Provider speaking the `/chat/completions` protocol
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ClassifiedError> {
        let client = http_client(config)?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url_or_default()),
            api_key: config.api_key.clone(),
            model: config.model_or_default().to_string(),
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        }
    }
}

/// Extract the first choice's text. A null content is an empty reply,
/// which the validator then rejects as malformed.
pub fn parse_chat_envelope(body: &str) -> Result<String, ProviderFailure> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ProviderFailure::envelope(format!("invalid chat envelope: {e}"), body))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| ProviderFailure::envelope("chat envelope has no choices", body))
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await?;

        let body = read_body(response).await?;
        debug!(model = %self.model, bytes = body.len(), "Chat completion received");

        parse_chat_envelope(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_envelope() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"```json\n{}\n```"}}]}"#;
        assert_eq!(parse_chat_envelope(body).unwrap(), "```json\n{}\n```");
    }

    #[test]
    fn test_null_content_is_empty_reply() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_chat_envelope(body).unwrap(), "");
    }

    #[test]
    fn test_bad_envelopes() {
        assert!(matches!(
            parse_chat_envelope(r#"{"choices":[]}"#),
            Err(ProviderFailure::Envelope { .. })
        ));
        assert!(matches!(
            parse_chat_envelope("<html>gateway</html>"),
            Err(ProviderFailure::Envelope { .. })
        ));
    }

    #[test]
    fn test_request_shape() {
        let config = ProviderConfig {
            kind: crate::config::ProviderKind::OpenaiCompatible,
            api_key: "k".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            base_url: Some("https://api.openai.com/v1/".to_string()),
            timeout_ms: 1_000,
        };
        let provider = OpenAiCompatibleProvider::from_config(&config).unwrap();
        assert_eq!(provider.endpoint, "https://api.openai.com/v1/chat/completions");

        let value = serde_json::to_value(provider.request("hello")).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hello");
    }
}
