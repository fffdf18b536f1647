//! Append-only JSONL history log

use async_trait::async_trait;
use post_batcher_domain::{HistoryError, HistoryLog, PublishedRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One line of the history file
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum HistoryEvent {
    Published(PublishedRecord),
}

/// History log stored as one JSON object per line
///
/// Lines that fail to parse, or carry an event other than `published`,
/// are skipped on load.
pub struct JsonlHistoryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl HistoryLog for JsonlHistoryLog {
    async fn load_seen(&self) -> Result<HashSet<String>, HistoryError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut seen = HashSet::new();
        let mut skipped = 0usize;
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<HistoryEvent>(line) {
                Ok(HistoryEvent::Published(record)) => {
                    seen.insert(record.text);
                }
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!(
                path = %self.path.display(),
                skipped = skipped,
                "Skipped unrecognised history lines"
            );
        }

        Ok(seen)
    }

    async fn record_published(&self, record: &PublishedRecord) -> Result<(), HistoryError> {
        let line = serde_json::to_string(&HistoryEvent::Published(record.clone()))
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        Ok(())
    }
}
