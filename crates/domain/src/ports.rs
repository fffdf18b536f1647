//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};

use crate::model::{Batch, Prompt, PublishedRecord};

/// Error type for text provider operations
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
    #[error("Empty response")]
    Empty,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether another attempt against the same provider may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Api(_)
                | ProviderError::Network(_)
                | ProviderError::RateLimited
                | ProviderError::Timeout
                | ProviderError::InvalidFormat(_)
                | ProviderError::Empty
        )
    }
}

/// Port for an LLM text-generation backend
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Name of this chain link (e.g., "openai:gpt-4o-mini")
    fn name(&self) -> &str;

    /// Whether the provider's credential precondition is met
    fn is_available(&self) -> bool;

    /// Send a prompt, receive raw text
    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

/// Port for a lexicon-based positivity scorer
pub trait SentimentScorer: Send + Sync {
    /// Scalar positivity, roughly in [-1.0, 1.0]
    fn score(&self, text: &str) -> f64;
}

/// Error type for batch store operations
#[derive(Debug, Error)]
pub enum BatchStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the persisted date-stamped batch
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Load the current batch, if any
    async fn load(&self) -> Result<Option<Batch>, BatchStoreError>;

    /// Replace the stored batch atomically
    async fn save(&self, batch: &Batch) -> Result<(), BatchStoreError>;

    /// Delete the stored batch (no-op when absent)
    async fn remove(&self) -> Result<(), BatchStoreError>;
}

/// Error type for history log operations
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the append-only log of published text
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// All texts published so far
    async fn load_seen(&self) -> Result<HashSet<String>, HistoryError>;

    /// Append a published record
    async fn record_published(&self, record: &PublishedRecord) -> Result<(), HistoryError>;
}

/// Error type for publisher operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Content too long: {len} > {max}")]
    ContentTooLong { len: usize, max: usize },
}

/// Result of a successful publish operation
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// Platform-specific post ID
    pub id: String,
    /// URL to the published content, if available
    pub url: Option<String>,
}

/// Port for the downstream posting collaborator
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a single post text, returns the published ID
    async fn publish(&self, text: &str) -> Result<PublishResult, PublishError>;

    /// Check if this publisher is enabled
    fn is_enabled(&self) -> bool;

    /// Get the platform name (e.g., "x", "outbox")
    fn platform(&self) -> &'static str;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time in the deployment's offset
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation with a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}
