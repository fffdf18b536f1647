//! OpenAI-compatible chat completions adapter (OpenAI, OpenRouter, generic)

use async_trait::async_trait;
use post_batcher_domain::{Prompt, ProviderError, TextProvider};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{LlmConfig, SYSTEM_PROMPT, build_client, check_status, send_error};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Chat completions provider for any OpenAI-compatible endpoint
pub struct OpenAiCompatProvider {
    name: String,
    client: Client,
    api_key: SecretString,
    base_url: String,
    extra_headers: Vec<(String, String)>,
    config: LlmConfig,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        api_key: SecretString,
        base_url: impl Into<String>,
        config: LlmConfig,
    ) -> Result<Self, ProviderError> {
        let client = build_client(config.timeout_secs)?;
        let base_url: String = base_url.into();

        Ok(Self {
            name: name.into(),
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            extra_headers: vec![],
            config,
        })
    }

    /// Extra request headers (e.g. OpenRouter's `HTTP-Referer` and `X-Title`)
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_headers = headers;
        self
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.as_str().to_string(),
                },
            ],
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_output_tokens),
        };

        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request);
        for (name, value) in &self.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = check_status(builder.send().await.map_err(send_error)?).await?;

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidFormat(e.to_string()))?;

        let text = api_response
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::Empty);
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(
            "openai:gpt-4o-mini",
            SecretString::new("test-key".into()),
            format!("{}/v1/", server.uri()),
            LlmConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("x-title", "post-batcher"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Tweet 1: Hello"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server)
            .with_headers(vec![("X-Title".to_string(), "post-batcher".to_string())]);
        let text = provider.generate(&Prompt::new("Write")).await.unwrap();

        assert_eq!(text, "Tweet 1: Hello");
    }

    #[tokio::test]
    async fn test_status_codes_map_to_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate(&Prompt::new("Write"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Auth(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate(&Prompt::new("Write"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn test_null_content_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": null}}]
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate(&Prompt::new("Write"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Empty));
    }
}
