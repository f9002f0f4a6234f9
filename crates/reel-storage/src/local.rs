//! Local filesystem storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Where the pipeline puts generated files.
///
/// Paths handed out are relative to the storage root and always use
/// forward slashes.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Write `bytes` under `subdir` with a fresh random name ending in
    /// `extension` (e.g. `.png`), returning the relative path.
    async fn save_bytes(&self, bytes: &[u8], subdir: &str, extension: &str)
        -> StorageResult<String>;

    /// Write `bytes` at a caller-chosen relative path, replacing any
    /// existing file.
    async fn save_at(&self, relative: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Absolute filesystem location of a relative path.
    fn absolute_path(&self, relative: &str) -> PathBuf;

    /// URL under which a relative path is served.
    fn public_url(&self, relative: &str) -> String;
}

/// Storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create storage rooted at `root`. A relative root is resolved
    /// against the current directory.
    pub fn new(root: impl AsRef<Path>, base_url: impl Into<String>) -> StorageResult<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| StorageError::config_error(format!("cannot resolve storage root: {e}")))?
                .join(root)
        };

        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a relative key, refusing anything that leaves the root.
    fn resolve(&self, relative: &str) -> StorageResult<PathBuf> {
        let key = Path::new(relative);
        let escapes = key.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || relative.trim().is_empty() {
            return Err(StorageError::invalid_key(relative));
        }
        Ok(self.root.join(key))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StorageError::write_failed(e.to_string()))
    }
}

#[async_trait]
impl StorageGateway for LocalStorage {
    async fn save_bytes(
        &self,
        bytes: &[u8],
        subdir: &str,
        extension: &str,
    ) -> StorageResult<String> {
        let subdir = subdir.trim_matches('/');
        let extension = if extension.is_empty() || extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{extension}")
        };
        let relative = format!("{subdir}/{}{extension}", Uuid::new_v4());

        let path = self.resolve(&relative)?;
        self.write(&path, bytes).await?;

        debug!(path = %relative, size = bytes.len(), "Saved asset");
        Ok(relative)
    }

    async fn save_at(&self, relative: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.resolve(relative)?;
        self.write(&path, bytes).await?;
        info!(path = %relative, size = bytes.len(), "Saved file");
        Ok(())
    }

    fn absolute_path(&self, relative: &str) -> PathBuf {
        let relative = relative.trim_start_matches('/');
        self.root.join(relative)
    }

    fn public_url(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/').replace('\\', "/");
        format!("{}/static/{}", self.base_url, relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_bytes_names_by_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000/").unwrap();

        let rel = storage.save_bytes(b"png-bytes", "scenes", ".png").await.unwrap();
        assert!(rel.starts_with("scenes/"));
        assert!(rel.ends_with(".png"));

        let stem = rel.trim_start_matches("scenes/").trim_end_matches(".png");
        assert!(Uuid::parse_str(stem).is_ok());

        let bytes = std::fs::read(storage.absolute_path(&rel)).unwrap();
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn test_extension_without_dot() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://x").unwrap();
        let rel = storage.save_bytes(b"a", "audio", "mp3").await.unwrap();
        assert!(rel.ends_with(".mp3"));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://x").unwrap();

        let err = storage.save_bytes(b"a", "../outside", ".png").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));

        let err = storage.save_at("/etc/passwd", b"a").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_save_at_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://x").unwrap();
        storage.save_at("videos/job.srt", b"one").await.unwrap();
        storage.save_at("videos/job.srt", b"two").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("videos/job.srt")).unwrap(), b"two");
    }

    #[test]
    fn test_public_url() {
        let storage = LocalStorage::new("/srv/uploads", "https://reels.example.com/").unwrap();
        assert_eq!(
            storage.public_url("videos/abc.mp4"),
            "https://reels.example.com/static/videos/abc.mp4"
        );
        assert_eq!(
            storage.absolute_path("scenes/a.png"),
            PathBuf::from("/srv/uploads/scenes/a.png")
        );
    }

    #[test]
    fn test_relative_root_is_absolutized() {
        let storage = LocalStorage::new("uploads", "http://x").unwrap();
        assert!(storage.root().is_absolute());
    }
}
