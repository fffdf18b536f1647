//! Filesystem batch store with atomic replacement

use async_trait::async_trait;
use post_batcher_domain::{Batch, BatchStore, BatchStoreError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Stores the batch as pretty-printed JSON at a fixed path
///
/// Saves go through a sibling temp file and a rename, so readers see
/// either the previous batch or the new one, never a partial write.
pub struct FsBatchStore {
    path: PathBuf,
}

impl FsBatchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "batch.json".into());
        name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl BatchStore for FsBatchStore {
    async fn load(&self) -> Result<Option<Batch>, BatchStoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let batch: Batch = serde_json::from_str(&contents)
            .map_err(|e| BatchStoreError::Serialization(e.to_string()))?;

        if batch.version != Batch::FORMAT_VERSION {
            return Err(BatchStoreError::Serialization(format!(
                "Unsupported batch version {} (expected {})",
                batch.version,
                Batch::FORMAT_VERSION
            )));
        }

        Ok(Some(batch))
    }

    async fn save(&self, batch: &Batch) -> Result<(), BatchStoreError> {
        let json = serde_json::to_vec_pretty(batch)
            .map_err(|e| BatchStoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp = self.temp_path();
        let write = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&json).await?;
            file.write_all(b"\n").await?;
            file.sync_all().await?;
            fs::rename(&temp, &self.path).await
        };

        if let Err(e) = write.await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        tracing::debug!(
            path = %self.path.display(),
            items = batch.items.len(),
            "Saved batch"
        );
        Ok(())
    }

    async fn remove(&self) -> Result<(), BatchStoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
