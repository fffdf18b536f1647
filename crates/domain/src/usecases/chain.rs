//! Provider chain - ordered fallback across text-generation backends

use std::sync::Arc;
use std::time::Duration;

use crate::model::{Prompt, RawResponse};
use crate::ports::{ProviderError, TextProvider};

/// Configuration for the provider chain
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Upper bound for a single invocation
    pub timeout: Duration,
    /// Extra attempts per provider for retryable errors
    pub retries: u32,
    /// Base delay for exponential backoff between attempts
    pub backoff: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Every available provider failed
#[derive(Debug, Clone, thiserror::Error)]
#[error("All providers failed: {}", summarize(.errors))]
pub struct ChainFailure {
    /// Per-provider failure reasons, in chain order
    pub errors: Vec<(String, ProviderError)>,
}

fn summarize(errors: &[(String, ProviderError)]) -> String {
    if errors.is_empty() {
        return "no provider available".to_string();
    }
    errors
        .iter()
        .map(|(name, error)| format!("{}: {}", name, error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Chain-of-responsibility over text providers
pub struct ProviderChain {
    providers: Vec<Arc<dyn TextProvider>>,
    config: ChainConfig,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn TextProvider>>, config: ChainConfig) -> Self {
        Self { providers, config }
    }

    /// Names of providers whose credential precondition is met
    pub fn available(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name())
            .collect()
    }

    pub fn has_available(&self) -> bool {
        self.providers.iter().any(|p| p.is_available())
    }

    /// Try providers in priority order; the first non-empty response wins
    pub async fn generate(&self, prompt: &Prompt) -> Result<RawResponse, ChainFailure> {
        let mut errors = Vec::new();

        for provider in &self.providers {
            if !provider.is_available() {
                tracing::debug!(provider = %provider.name(), "Skipping unavailable provider");
                continue;
            }

            match self.invoke_with_retry(provider.as_ref(), prompt).await {
                Ok(text) => {
                    tracing::info!(
                        provider = %provider.name(),
                        response_length = text.len(),
                        "Provider returned text"
                    );
                    return Ok(RawResponse {
                        provider: provider.name().to_string(),
                        text,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        provider = %provider.name(),
                        error = %error,
                        "Provider failed, trying next"
                    );
                    errors.push((provider.name().to_string(), error));
                }
            }
        }

        Err(ChainFailure { errors })
    }

    async fn invoke_with_retry(
        &self,
        provider: &dyn TextProvider,
        prompt: &Prompt,
    ) -> Result<String, ProviderError> {
        let mut last_error = None;

        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                let delay = self.config.backoff * 2_u32.saturating_pow(attempt);
                tracing::warn!(
                    provider = %provider.name(),
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying provider"
                );
                tokio::time::sleep(delay).await;
            }

            let result = match tokio::time::timeout(self.config.timeout, provider.generate(prompt))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };

            match result {
                Ok(text) if text.trim().is_empty() => last_error = Some(ProviderError::Empty),
                Ok(text) => return Ok(text),
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => last_error = Some(error),
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Api("Unknown error".to_string())))
    }
}
