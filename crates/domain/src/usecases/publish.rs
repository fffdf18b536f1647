//! Publish use case - drains the front of the stored batch

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::{
    model::PublishedRecord,
    ports::{
        BatchStore, BatchStoreError, Clock, HistoryError, HistoryLog, PublishError, Publisher,
    },
};

/// Configuration for a publish run
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Upper bound on items published in one run
    pub max_posts: usize,
    /// Fixed delay between consecutive posts
    pub delay: Duration,
    /// Log what would be posted without touching the batch
    pub dry_run: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_posts: 1,
            delay: Duration::from_secs(30),
            dry_run: true,
        }
    }
}

/// Errors that abort a publish run
#[derive(Debug, thiserror::Error)]
pub enum PublishRunError {
    #[error("Batch store error: {0}")]
    BatchStore(#[from] BatchStoreError),
    #[error("Publisher '{0}' is disabled")]
    Disabled(&'static str),
    #[error("Posted but not recorded in history: {0}")]
    History(#[from] HistoryError),
}

/// Summary of a publish run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Items posted and removed from the batch
    pub published: usize,
    /// Items that would have been posted (dry-run only)
    pub previewed: usize,
    /// Items left in the batch afterwards
    pub remaining: usize,
    /// Whether the run stopped on a publisher failure
    pub stopped_on_error: bool,
}

/// Publishes pending batch items through one publisher
pub struct PublishUseCase<B, H, P, Cl>
where
    B: BatchStore + ?Sized,
    H: HistoryLog + ?Sized,
    P: Publisher + ?Sized,
    Cl: Clock + ?Sized,
{
    batch_store: Arc<B>,
    history: Arc<H>,
    publisher: Arc<P>,
    clock: Arc<Cl>,
    config: PublishConfig,
}

impl<B, H, P, Cl> PublishUseCase<B, H, P, Cl>
where
    B: BatchStore + ?Sized,
    H: HistoryLog + ?Sized,
    P: Publisher + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        batch_store: Arc<B>,
        history: Arc<H>,
        publisher: Arc<P>,
        clock: Arc<Cl>,
        config: PublishConfig,
    ) -> Self {
        Self {
            batch_store,
            history,
            publisher,
            clock,
            config,
        }
    }

    pub async fn run(&self) -> Result<PublishReport, PublishRunError> {
        let Some(mut batch) = self.batch_store.load().await? else {
            tracing::info!("No pending batch, nothing to publish");
            return Ok(PublishReport::default());
        };

        let mut report = PublishReport {
            remaining: batch.items.len(),
            ..Default::default()
        };

        if self.config.dry_run {
            for item in batch.items.iter().take(self.config.max_posts) {
                tracing::info!(
                    platform = self.publisher.platform(),
                    chars = item.text.chars().count(),
                    text = %item.text,
                    "[DRY RUN] Would publish"
                );
                report.previewed += 1;
            }
            return Ok(report);
        }

        if !self.publisher.is_enabled() {
            return Err(PublishRunError::Disabled(self.publisher.platform()));
        }

        while report.published < self.config.max_posts {
            let Some(item) = batch.front() else {
                break;
            };

            if report.published > 0 && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }

            let text = item.text.clone();
            let result = match self.publisher.publish(&text).await {
                Ok(result) => result,
                Err(error) => {
                    log_publish_failure(&error, self.publisher.platform());
                    report.stopped_on_error = true;
                    break;
                }
            };

            batch.consume_front();
            report.published += 1;

            tracing::info!(
                platform = self.publisher.platform(),
                post_id = %result.id,
                url = result.url.as_deref().unwrap_or(""),
                remaining = batch.items.len(),
                "Published post"
            );

            let record = PublishedRecord {
                id: Uuid::new_v4(),
                post_id: result.id,
                platform: self.publisher.platform().to_string(),
                text,
                published_at: self.clock.now(),
            };

            if batch.is_empty() {
                self.batch_store.remove().await?;
            } else {
                self.batch_store.save(&batch).await?;
            }

            if let Err(e) = self.history.record_published(&record).await {
                tracing::error!(
                    error = %e,
                    post_id = %record.post_id,
                    "Failed to record published post in history"
                );
                return Err(e.into());
            }
        }

        report.remaining = batch.items.len();
        Ok(report)
    }
}

fn log_publish_failure(error: &PublishError, platform: &str) {
    match error {
        PublishError::RateLimited => {
            tracing::warn!(platform = platform, "Rate limited, leaving batch untouched")
        }
        _ => tracing::error!(platform = platform, error = %error, "Failed to publish"),
    }
}
