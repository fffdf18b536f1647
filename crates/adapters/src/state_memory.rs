//! In-memory history log for tests and offline runs

use async_trait::async_trait;
use post_batcher_domain::{HistoryError, HistoryLog, PublishedRecord};
use std::collections::HashSet;
use std::sync::RwLock;

/// In-memory history log implementation
#[derive(Default)]
pub struct InMemoryHistoryLog {
    records: RwLock<Vec<PublishedRecord>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryLog for InMemoryHistoryLog {
    async fn load_seen(&self) -> Result<HashSet<String>, HistoryError> {
        let records = self
            .records
            .read()
            .map_err(|e| HistoryError::Database(e.to_string()))?;
        Ok(records.iter().map(|r| r.text.clone()).collect())
    }

    async fn record_published(&self, record: &PublishedRecord) -> Result<(), HistoryError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| HistoryError::Database(e.to_string()))?;
        records.push(record.clone());
        Ok(())
    }
}
