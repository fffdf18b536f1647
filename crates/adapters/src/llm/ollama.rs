//! Ollama local LLM adapter

use async_trait::async_trait;
use post_batcher_domain::{Prompt, ProviderError, TextProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmConfig, SYSTEM_PROMPT, build_client, check_status, send_error};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Ollama provider for local models; needs no credential
pub struct OllamaProvider {
    name: String,
    client: Client,
    base_url: String,
    config: LlmConfig,
}

impl OllamaProvider {
    pub fn new(name: impl Into<String>, config: LlmConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(name, OLLAMA_BASE_URL, config)
    }

    pub fn with_base_url(
        name: impl Into<String>,
        base_url: impl Into<String>,
        config: LlmConfig,
    ) -> Result<Self, ProviderError> {
        let base_url: String = base_url.into();
        Ok(Self {
            name: name.into(),
            client: build_client(config.timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl TextProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.as_str().to_string(),
            system: Some(SYSTEM_PROMPT.to_string()),
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
                num_predict: i32::try_from(self.config.max_output_tokens).ok(),
            }),
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;
        let response = check_status(response).await?;

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidFormat(e.to_string()))?;

        if api_response.response.trim().is_empty() {
            return Err(ProviderError::Empty);
        }

        Ok(api_response.response)
    }
}
