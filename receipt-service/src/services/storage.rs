//! Artifact store: durable home for rendered receipt documents.

use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Stores rendered artifacts and hands back an opaque reference.
///
/// `delete` is idempotent: deleting a reference that no longer exists (or was
/// never written) must succeed, so saga compensation can run unconditionally.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `data` under `key` and return the reference to record.
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<String, AppError>;

    async fn download(&self, reference: &str) -> Result<Vec<u8>, AppError>;

    async fn delete(&self, reference: &str) -> Result<(), AppError>;
}

/// Filesystem-backed store; the reference is the key relative to `base_path`.
pub struct LocalArtifactStore {
    base_path: PathBuf,
}

impl LocalArtifactStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(reference);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid artifact reference: {}",
                reference
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<String, AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        tracing::debug!(key = %key, "Artifact stored");
        Ok(key.to_string())
    }

    async fn download(&self, reference: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(reference)?;
        let data = fs::read(&path).await.map_err(|e| {
            AppError::NotFound(anyhow::anyhow!("Artifact {} unreadable: {}", reference, e))
        })?;
        Ok(data)
    }

    async fn delete(&self, reference: &str) -> Result<(), AppError> {
        let path = self.resolve(reference)?;
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_download_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path()).await.unwrap();

        let reference = store
            .store("receipts/abc.html", b"<html></html>".to_vec())
            .await
            .unwrap();
        assert_eq!(reference, "receipts/abc.html");

        let data = store.download(&reference).await.unwrap();
        assert_eq!(data, b"<html></html>");

        store.delete(&reference).await.unwrap();
        assert!(store.download(&reference).await.is_err());
    }

    #[tokio::test]
    async fn delete_of_missing_reference_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path()).await.unwrap();
        store.delete("receipts/never-written.html").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_traversal_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path()).await.unwrap();
        assert!(store.download("../escape.html").await.is_err());
    }
}
