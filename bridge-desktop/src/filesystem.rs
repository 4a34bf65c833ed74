//! `FileSystemAccess` over `tokio::fs`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const APP_DIR_NAME: &str = "skatefit";

/// `write_file` syncs before returning, so a following `rename` never
/// publishes a partially written file.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Platform data directory used for the content cache when the host
    /// does not choose one.
    pub fn default_content_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join(APP_DIR_NAME)
            .join("GitHubContent")
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    fn unix_secs(time: std::io::Result<std::time::SystemTime>) -> Option<i64> {
        time.ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(Self::map_io_error)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await.map_err(Self::map_io_error)?;

        Ok(FileMetadata {
            size: metadata.len(),
            created_at: Self::unix_secs(metadata.created()),
            modified_at: Self::unix_secs(metadata.modified()),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(path).await.map_err(Self::map_io_error)?;
        file.write_all(data.as_ref())
            .await
            .map_err(Self::map_io_error)?;
        file.sync_all().await.map_err(Self::map_io_error)?;

        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).await.map_err(Self::map_io_error)?;
        debug!(from = ?from, to = ?to, "Renamed file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted directory");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path).await.map_err(Self::map_io_error)?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(Self::map_io_error)?
        {
            entries.push(entry.path());
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn directory_size(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;
        let entries = self.list_directory(path).await?;

        for entry in entries {
            // Staging files are renamed away while videos download.
            let metadata = match self.metadata(&entry).await {
                Ok(metadata) => metadata,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            if metadata.is_directory {
                match self.directory_size(&entry).await {
                    Ok(size) => total += size,
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
            } else {
                total += metadata.size;
            }
        }

        debug!(path = ?path, size = total, "Calculated directory size");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        env::temp_dir().join(format!("bridge-desktop-fs-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_default_content_root_is_app_scoped() {
        let root = TokioFileSystem::default_content_root();
        assert!(root.ends_with(Path::new(APP_DIR_NAME).join("GitHubContent")));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let fs = TokioFileSystem::new();
        let dir = scratch_dir();
        let test_file = dir.join("nested").join("test-file.txt");

        let data = Bytes::from("Hello, World!");
        fs.write_file(&test_file, data.clone()).await.unwrap();

        let read_data = fs.read_file(&test_file).await.unwrap();
        assert_eq!(data, read_data);

        fs.delete_dir_all(&dir).await.unwrap();
        assert!(!fs.exists(&dir).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_replaces_target() {
        let fs = TokioFileSystem::new();
        let dir = scratch_dir();
        let target = dir.join("manifest.json");
        let staging = dir.join("manifest.json.tmp");

        fs.write_file(&target, Bytes::from_static(b"old")).await.unwrap();
        fs.write_file(&staging, Bytes::from_static(b"new")).await.unwrap();
        fs.rename(&staging, &target).await.unwrap();

        assert_eq!(fs.read_file(&target).await.unwrap(), Bytes::from_static(b"new"));
        assert!(!fs.exists(&staging).await.unwrap());

        fs.delete_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_reports_not_found() {
        let fs = TokioFileSystem::new();
        let err = fs
            .read_file(&scratch_dir().join("absent.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_directory_size_is_recursive() {
        let fs = TokioFileSystem::new();
        let dir = scratch_dir();
        fs.write_file(&dir.join("a.bin"), Bytes::from(vec![1u8; 100]))
            .await
            .unwrap();
        fs.write_file(&dir.join("videos").join("b.mp4"), Bytes::from(vec![2u8; 50]))
            .await
            .unwrap();

        assert_eq!(fs.directory_size(&dir).await.unwrap(), 150);

        fs.delete_dir_all(&dir).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_directory_size_tolerates_concurrent_renames() {
        let fs = TokioFileSystem::new();
        let dir = scratch_dir();
        let videos = dir.join("videos");
        fs.create_dir_all(&videos).await.unwrap();

        let writer = {
            let videos = videos.clone();
            tokio::spawn(async move {
                let fs = TokioFileSystem::new();
                for i in 0..200 {
                    let staging = videos.join(format!(".tmp-{}", Uuid::new_v4()));
                    fs.write_file(&staging, Bytes::from(vec![0u8; 64])).await.unwrap();
                    fs.rename(&staging, &videos.join(format!("clip{}.mp4", i % 4)))
                        .await
                        .unwrap();
                }
            })
        };

        while !writer.is_finished() {
            fs.directory_size(&dir).await.unwrap();
        }
        writer.await.unwrap();

        assert_eq!(fs.directory_size(&dir).await.unwrap(), 4 * 64);
        fs.delete_dir_all(&dir).await.unwrap();
    }
}
