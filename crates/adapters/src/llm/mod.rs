//! LLM provider adapters

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai_compat;
pub mod stub;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use stub::StubProvider;

use async_trait::async_trait;
use post_batcher_domain::{Prompt, ProviderError, TextProvider};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// System message sent alongside every prompt
pub(crate) const SYSTEM_PROMPT: &str =
    "You write short, upbeat social media posts. Follow the requested output format exactly.";

/// Common LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.9,
            max_output_tokens: 1500,
            timeout_secs: 30,
        }
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Config(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn send_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// Map a non-success HTTP status into the provider error taxonomy
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("API returned {}: {}", status, truncate(&body, 300));

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth(message),
        s if s.is_server_error() => ProviderError::Api(message),
        _ => ProviderError::InvalidRequest(message),
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Chain link whose credential precondition is not met
///
/// Skipped by the chain without counting as a failure.
pub struct UnavailableProvider {
    name: String,
    reason: String,
}

impl UnavailableProvider {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextProvider for UnavailableProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        Err(ProviderError::Config(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[tokio::test]
    async fn test_unavailable_provider_reports_reason() {
        let provider = UnavailableProvider::new("openai:gpt-4o", "OPENAI_API_KEY not set");
        assert!(!provider.is_available());
        let err = provider.generate(&Prompt::new("x")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Config(msg) if msg.contains("OPENAI_API_KEY")));
    }
}
