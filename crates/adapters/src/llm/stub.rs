//! Stub provider for testing and offline mode

use std::sync::Mutex;

use async_trait::async_trait;
use post_batcher_domain::{Prompt, ProviderError, TextProvider};

/// Stub provider that replays scripted responses in order
///
/// Once the script is exhausted every call fails with an API error, so a
/// stub can stand in for a provider that runs out of quota mid-session.
pub struct StubProvider {
    name: String,
    responses: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn new(name: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl TextProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| ProviderError::Api("stub state poisoned".to_string()))?;
        if responses.is_empty() {
            return Err(ProviderError::Api("stub responses exhausted".to_string()));
        }
        Ok(responses.remove(0))
    }
}
