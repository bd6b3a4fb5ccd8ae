//! Object store the staging artifacts are uploaded to before the warehouse
//! load. Production deployments point this at a cloud bucket; the local
//! implementation mirrors one under a directory.

use crate::errors::{Result, StorageError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Uploads a local artifact under `path` inside the bucket and returns
    /// the resulting location.
    async fn upload(&self, path: &str, artifact: &Path) -> Result<String>;
}

pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for LocalBucket {
    async fn upload(&self, path: &str, artifact: &Path) -> Result<String> {
        if path.is_empty() || path.starts_with('/') || path.contains("..") {
            return Err(StorageError::Staging(format!(
                "invalid object path: {path}"
            )));
        }
        let destination = self.root.join(path);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(artifact, &destination).await?;
        Ok(destination.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upload_copies_artifact() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("artifact.parquet");
        tokio::fs::write(&artifact, b"columnar bytes").await.unwrap();

        let bucket = LocalBucket::new(dir.path().join("bucket"));
        let location = bucket
            .upload("staging/unified/ingestion_date=2024-03-01/ctgov.parquet", &artifact)
            .await
            .unwrap();

        let copied = tokio::fs::read(&location).await.unwrap();
        assert_eq!(copied, b"columnar bytes");
    }

    #[tokio::test]
    async fn test_upload_rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("artifact.parquet");
        tokio::fs::write(&artifact, b"x").await.unwrap();

        let bucket = LocalBucket::new(dir.path().join("bucket"));
        let err = bucket.upload("../outside.parquet", &artifact).await;
        assert!(err.is_err());
    }
}
