//! X API write adapter for publishing posts

use async_trait::async_trait;
use post_batcher_domain::{PublishError, PublishResult, Publisher};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const X_API_BASE_URL: &str = "https://api.twitter.com";

/// X API publisher creating standalone posts
pub struct XPublisher {
    client: Client,
    user_token: SecretString,
    base_url: String,
    max_chars: usize,
    enabled: bool,
}

impl XPublisher {
    pub fn new(user_token: SecretString, max_chars: usize) -> Result<Self, PublishError> {
        Self::with_base_url(user_token, X_API_BASE_URL.to_string(), max_chars)
    }

    pub fn with_base_url(
        user_token: SecretString,
        base_url: String,
        max_chars: usize,
    ) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PublishError::Api(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_token,
            base_url,
            max_chars,
            enabled: true,
        })
    }

    /// Create a disabled publisher (for testing/dry-run)
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            user_token: SecretString::new("".into()),
            base_url: String::new(),
            max_chars: 280,
            enabled: false,
        }
    }
}

#[derive(Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CreateTweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[async_trait]
impl Publisher for XPublisher {
    async fn publish(&self, text: &str) -> Result<PublishResult, PublishError> {
        if !self.enabled {
            return Err(PublishError::Api("Publisher is disabled".to_string()));
        }

        let len = text.chars().count();
        if len > self.max_chars {
            return Err(PublishError::ContentTooLong {
                len,
                max: self.max_chars,
            });
        }

        let url = format!("{}/2/tweets", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.user_token.expose_secret())
            .json(&CreateTweetRequest { text })
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                return Err(PublishError::Auth(format!("Token rejected: {}", body)));
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(PublishError::RateLimited),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(PublishError::Api(format!(
                    "Failed to create tweet ({}): {}",
                    status, body
                )));
            }
            _ => {}
        }

        let tweet_response: CreateTweetResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let id = tweet_response.data.id;
        Ok(PublishResult {
            url: Some(format!("https://x.com/i/status/{}", id)),
            id,
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn platform(&self) -> &'static str {
        "x"
    }
}
