//! Anthropic Claude API adapter

use async_trait::async_trait;
use post_batcher_domain::{Prompt, ProviderError, TextProvider};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{LlmConfig, SYSTEM_PROMPT, build_client, check_status, send_error};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic messages API provider
pub struct AnthropicProvider {
    name: String,
    client: Client,
    api_key: SecretString,
    base_url: String,
    config: LlmConfig,
}

impl AnthropicProvider {
    pub fn new(
        name: impl Into<String>,
        api_key: SecretString,
        config: LlmConfig,
    ) -> Result<Self, ProviderError> {
        Self::with_base_url(name, api_key, ANTHROPIC_BASE_URL, config)
    }

    pub fn with_base_url(
        name: impl Into<String>,
        api_key: SecretString,
        base_url: impl Into<String>,
        config: LlmConfig,
    ) -> Result<Self, ProviderError> {
        let base_url: String = base_url.into();
        Ok(Self {
            name: name.into(),
            client: build_client(config.timeout_secs)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    r#type: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl TextProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_output_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.as_str().to_string(),
            }],
            system: Some(SYSTEM_PROMPT.to_string()),
            // Anthropic caps temperature at 1.0
            temperature: Some(self.config.temperature.min(1.0)),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;
        let response = check_status(response).await?;

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidFormat(e.to_string()))?;

        let text = api_response
            .content
            .into_iter()
            .filter(|c| c.r#type == "text")
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::Empty);
        }

        Ok(text)
    }
}
