//! Filesystem-backed storage.
//!
//! Objects live as flat files directly under the base directory, named by
//! their key. Writes go to a hidden temp file first and are then hard-linked
//! into place, so a key is either fully present or absent and an existing
//! key is never replaced.

use crate::services::storage::{ObjectAccess, StorageBackend, StorageError};
use crate::utils::validation::is_safe_key;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// Bytes read from the start of a file to guess its type.
const SNIFF_LEN: u64 = 8192;

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Creates the base directory if it doesn't exist.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        tokio::fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

async fn remove_temp(temp_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp_path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        let temp_path = self.base_path.join(format!(".{}.tmp", Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&temp_path, &data).await {
            remove_temp(&temp_path).await;
            return Err(e.into());
        }

        // hard_link fails with AlreadyExists instead of replacing the target
        let linked = tokio::fs::hard_link(&temp_path, &path).await;
        remove_temp(&temp_path).await;

        match linked {
            Ok(()) => {
                tracing::info!(
                    key = %key,
                    path = %path.display(),
                    size = data.len(),
                    "Stored video file"
                );
                Ok(self.resolve_location(key))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_location(&self, key: &str) -> String {
        self.base_path.join(key).to_string_lossy().to_string()
    }

    async fn open(&self, key: &str) -> Result<ObjectAccess, StorageError> {
        let path = self.path_for(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ObjectAccess::NotFound),
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        // Only the header is read for sniffing; the body is streamed later
        let mut header = Vec::with_capacity(SNIFF_LEN as usize);
        file.take(SNIFF_LEN).read_to_end(&mut header).await?;
        let content_type = infer::get(&header)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

        Ok(ObjectAccess::File {
            path,
            size,
            content_type,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("videos")).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_put_then_open_returns_same_bytes() {
        let (_dir, storage) = storage().await;
        let data = Bytes::from_static(b"\x00\x00\x00\x18ftypmp42 not really a movie");

        let location = storage.put("abc-123.mp4", data.clone(), "video/mp4").await.unwrap();
        assert_eq!(location, storage.resolve_location("abc-123.mp4"));
        assert!(storage.exists("abc-123.mp4").await.unwrap());

        match storage.open("abc-123.mp4").await.unwrap() {
            ObjectAccess::File {
                path,
                size,
                content_type,
            } => {
                assert_eq!(size, data.len() as u64);
                assert_eq!(content_type, "video/mp4");
                assert_eq!(tokio::fs::read(path).await.unwrap(), data.to_vec());
            }
            other => panic!("unexpected access: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_never_overwrites() {
        let (_dir, storage) = storage().await;
        storage.put("dup", Bytes::from_static(b"first"), "video/mp4").await.unwrap();

        let err = storage
            .put("dup", Bytes::from_static(b"second"), "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        match storage.open("dup").await.unwrap() {
            ObjectAccess::File { path, size, .. } => {
                assert_eq!(size, 5);
                assert_eq!(tokio::fs::read(path).await.unwrap(), b"first");
            }
            other => panic!("unexpected access: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let (_dir, storage) = storage().await;
        storage.put("one.webm", Bytes::from_static(b"data"), "video/webm").await.unwrap();

        let mut entries = tokio::fs::read_dir(storage.base_path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["one.webm".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_link_removes_temp_file() {
        let (_dir, storage) = storage().await;
        // A directory squatting on the key makes the link step fail
        tokio::fs::create_dir(storage.base_path().join("taken.mp4"))
            .await
            .unwrap();

        let err = storage
            .put("taken.mp4", Bytes::from_static(b"data"), "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let mut entries = tokio::fs::read_dir(storage.base_path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "leftover temp file {}", name);
        }
    }

    #[tokio::test]
    async fn test_remove_temp_tolerates_missing_file() {
        let (_dir, storage) = storage().await;
        let temp = storage.base_path().join(".partial.tmp");
        tokio::fs::write(&temp, b"half").await.unwrap();

        remove_temp(&temp).await;
        assert!(!tokio::fs::try_exists(&temp).await.unwrap());

        // Already gone is not an error
        remove_temp(&temp).await;
    }

    #[tokio::test]
    async fn test_write_error_is_reported() {
        let (_dir, storage) = storage().await;
        tokio::fs::remove_dir_all(storage.base_path()).await.unwrap();

        let err = storage
            .put("gone.mp4", Bytes::from_static(b"data"), "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[tokio::test]
    async fn test_rejects_unsafe_keys() {
        let (_dir, storage) = storage().await;
        let err = storage
            .put("../escape", Bytes::from_static(b"x"), "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(storage.open("../../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_open_missing_key() {
        let (_dir, storage) = storage().await;
        assert!(matches!(
            storage.open("missing.mp4").await.unwrap(),
            ObjectAccess::NotFound
        ));
        assert!(!storage.exists("missing.mp4").await.unwrap());
    }
}
