//! Cache file and settings seams.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File access used by the content cache.
///
/// A missing path surfaces as `BridgeError::Io` of kind `NotFound`, which
/// [`BridgeError::is_not_found`](crate::error::BridgeError::is_not_found) detects.
///
/// ```ignore
/// async fn publish(fs: &dyn FileSystemAccess, target: &Path, data: Bytes) -> Result<()> {
///     let staging = target.with_extension("tmp");
///     fs.write_file(&staging, data).await?;
///     fs.rename(&staging, target).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Creates the parent directory when it is missing.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Replaces `to` in one step when both paths share a volume.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    async fn delete_file(&self, path: &Path) -> Result<()>;

    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Sum of file sizes below `path`.
    ///
    /// Entries removed between listing and inspection are skipped, so a
    /// staging file renamed mid-scan does not fail the whole walk.
    async fn directory_size(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;

        for entry in self.list_directory(path).await? {
            let metadata = match self.metadata(&entry).await {
                Ok(metadata) => metadata,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            if !metadata.is_directory {
                total += metadata.size;
                continue;
            }
            match self.directory_size(&entry).await {
                Ok(size) => total += size,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        Ok(total)
    }
}

/// Persistent string settings, used for cache metadata.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Groups several writes. Readers see none of them before `commit`;
    /// dropping the transaction discards them.
    async fn begin_transaction(&self) -> Result<Box<dyn SettingsTransaction + Send>>;
}

#[async_trait]
pub trait SettingsTransaction: Send {
    async fn set_string(&mut self, key: &str, value: &str) -> Result<()>;

    async fn delete(&mut self, key: &str) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
