//! Approval outbox: posts queued in a JSONL file instead of going out.

use async_trait::async_trait;
use post_batcher_domain::ports::{PublishError, PublishResult, Publisher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One post waiting for a human to approve it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub platform: String,
    pub text: String,
    pub chars: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub queued_at: OffsetDateTime,
}

/// Publisher that appends each post to the outbox file
#[derive(Debug)]
pub struct OutboxPublisher {
    path: PathBuf,
    platform: &'static str,
    file: Mutex<File>,
}

impl OutboxPublisher {
    /// Open (or create) the outbox for appending
    pub async fn open(
        path: impl Into<PathBuf>,
        platform: &'static str,
    ) -> Result<Self, OutboxError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            platform,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &OutboxEntry) -> Result<(), OutboxError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for OutboxPublisher {
    async fn publish(&self, text: &str) -> Result<PublishResult, PublishError> {
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            platform: self.platform.to_string(),
            text: text.to_string(),
            chars: text.chars().count(),
            queued_at: OffsetDateTime::now_utc(),
        };

        self.append(&entry)
            .await
            .map_err(|error| PublishError::Api(format!("Outbox write failed: {}", error)))?;

        tracing::debug!(outbox = %self.path.display(), id = %entry.id, "Queued post for approval");

        Ok(PublishResult {
            id: entry.id,
            url: None,
        })
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn platform(&self) -> &'static str {
        self.platform
    }
}

/// Read every queued entry; a missing outbox is empty
pub async fn read_outbox(path: impl AsRef<Path>) -> Result<Vec<OutboxEntry>, OutboxError> {
    let contents = match fs::read_to_string(path.as_ref()).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(OutboxError::from))
        .collect()
}
