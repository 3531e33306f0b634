use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;

/// Attachment byte store. The upload flow relies on the ordering contract:
/// bytes are saved first, metadata second, and a failed metadata insert
/// triggers `delete` so no orphaned object survives a half-finished upload.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist the bytes and return the generated object key.
    async fn save(&self, bytes: &[u8]) -> Result<String, AppError>;
    async fn open(&self, stored_name: &str) -> Result<Vec<u8>, AppError>;
    async fn delete(&self, stored_name: &str) -> Result<(), AppError>;
}

/// Local-disk store rooted at `UPLOAD_DIR`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        Self::new(root)
    }

    fn path_for(&self, stored_name: &str) -> Result<PathBuf, AppError> {
        // Object keys are generated UUIDs; anything else never left this
        // process, so reject it outright.
        if stored_name.contains('/') || stored_name.contains("..") {
            return Err(AppError::bad_request("invalid object key"));
        }
        Ok(self.root.join(stored_name))
    }
}

#[async_trait]
impl ObjectStore for LocalFileStore {
    async fn save(&self, bytes: &[u8]) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let stored_name = Uuid::new_v4().to_string();
        let path = self.path_for(&stored_name)?;
        tokio::fs::write(&path, bytes).await?;

        Ok(stored_name)
    }

    async fn open(&self, stored_name: &str) -> Result<Vec<u8>, AppError> {
        let path = self.path_for(stored_name)?;
        let bytes = tokio::fs::read(&path).await?;
        Ok(bytes)
    }

    async fn delete(&self, stored_name: &str) -> Result<(), AppError> {
        let path = self.path_for(stored_name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}
