use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::StorageError;

/// Write-once blob storage for business photos
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Stores the bytes under `key` and returns the public URL. Existing keys are never overwritten.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Key of an object previously returned by `put`, `None` for foreign URLs.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

/// Builds `{owner}/{millis}_{file name}` with every segment reduced to a safe character set.
pub fn photo_key(owner_id: &str, uploaded_at: DateTime<Utc>, file_name: &str) -> String {
    let file_name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let file_name = match sanitize(file_name) {
        name if name.is_empty() => "photo".to_string(),
        name => name,
    };

    let owner = match sanitize(owner_id) {
        owner if owner.is_empty() => "owner".to_string(),
        owner => owner,
    };

    format!(
        "{}/{}_{}",
        owner,
        uploaded_at.timestamp_millis(),
        file_name
    )
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Photos kept on the local filesystem and served by a static file host
pub struct LocalPhotoStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalPhotoStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(key.to_string()),
                _ => StorageError::Io(e),
            })?;
        write_or_discard(&path, file, bytes).await?;

        log::debug!("Stored photo {} ({} bytes)", key, bytes.len());
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.public_base_url)?.strip_prefix('/')?;
        self.path_for(key).ok()?;
        Some(key.to_string())
    }
}

/// Writes the whole object or removes the partial file, so a failed write never claims the key.
async fn write_or_discard<W>(path: &Path, mut writer: W, bytes: &[u8]) -> Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let written = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };
    drop(writer);

    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(path).await {
            log::warn!("Failed to remove partial photo {}: {cleanup}", path.display());
        }
        return Err(StorageError::Io(e));
    }
    Ok(())
}
