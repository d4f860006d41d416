use async_trait::async_trait;
use models::CategoryKey;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::Result;

/// Repository trait for the per-category projection documents.
/// This abstraction allows swapping between file-based and database-backed implementations
#[async_trait]
pub trait ProjectionRepository: Send + Sync {
    /// Stored document for `category`, `None` if it was never written.
    async fn fetch(&self, category: CategoryKey) -> Result<Option<Value>>;
    async fn store(&self, category: CategoryKey, document: Value) -> Result<()>;
    async fn clear_all(&self) -> Result<()>;
}

/// File-based implementation keeping every category in one JSON object keyed
/// by category key.
pub struct FileProjectionRepository {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileProjectionRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Map::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_all(&self, documents: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(documents)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectionRepository for FileProjectionRepository {
    async fn fetch(&self, category: CategoryKey) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        let mut documents = self.read_all().await?;
        Ok(documents.remove(category.as_str()))
    }

    async fn store(&self, category: CategoryKey, document: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut documents = self.read_all().await?;
        documents.insert(category.as_str().to_string(), document);
        self.write_all(&documents).await
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_all(&Map::new()).await?;
        tracing::info!(path = %self.path.display(), "cleared all projection data");
        Ok(())
    }
}
