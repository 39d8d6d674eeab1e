use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{IngestError, Result};

/// content-addressed blob storage: one flat directory, file name = sha1 hex.
/// chunks, assembled files and thumbnails all live in the same namespace, so
/// identical bytes are stored exactly once no matter who wrote them.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// open the store, creating the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_path(&self, hash: &str) -> PathBuf {
        self.root.join(hash)
    }

    pub async fn contains(&self, hash: &str) -> bool {
        fs::try_exists(self.blob_path(hash)).await.unwrap_or(false)
    }

    /// store bytes under their hash. writes go to a temp file first and are
    /// renamed into place, so a concurrent reader never observes a partial
    /// blob. an existing blob short-circuits (dedup).
    pub async fn write(&self, hash: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.blob_path(hash);

        if fs::try_exists(&path).await.unwrap_or(false) {
            tracing::trace!("Blob {} already stored, skipping write", hash);
            return Ok(path);
        }

        let tmp = self.root.join(format!(".tmp-{}", Uuid::new_v4()));
        match self.write_tmp(&tmp, bytes).await {
            Ok(()) => {
                fs::rename(&tmp, &path).await.map_err(|e| {
                    tracing::error!("Failed to rename blob {} into place: {}", hash, e);
                    IngestError::Io(e)
                })?;
                tracing::trace!("Stored blob {} ({} bytes)", hash, bytes.len());
                Ok(path)
            }
            Err(e) => {
                // don't leave half-written temp files behind
                let _ = fs::remove_file(&tmp).await;
                Err(e)
            }
        }
    }

    async fn write_tmp(&self, tmp: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    /// read a blob fully into memory
    pub async fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(hash);
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IngestError::NotFound(format!("blob {} is not in the content store", hash))
            } else {
                IngestError::Io(e)
            }
        })
    }

    /// remove a blob; removing a blob that is already gone is fine
    pub async fn remove(&self, hash: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(hash)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IngestError::Io(e)),
        }
    }
}
