//! # Local Cache Store
//!
//! Durable storage for the manifest, the video files and the cache metadata.
//!
//! ```text
//! <cache_root>/
//! ├── manifest.json
//! └── videos/
//!     └── <name>.mp4
//! ```
//!
//! Files are written to a uniquely named sibling first and renamed over the
//! target, so readers never observe a partially written file. Metadata lives
//! in the [`SettingsStore`] and is written in a single transaction.

use crate::error::{ContentError, Result};
use crate::models::{normalize_video_file_name, parse_manifest, CacheMetadata, WorkoutManifest};
use async_trait::async_trait;
use bridge_traits::storage::{FileSystemAccess, SettingsStore};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const DEFAULT_VIDEOS_DIR: &str = "videos";

pub const LAST_SYNC_KEY: &str = "content.lastSyncTimestamp";
pub const CONTENT_VERSION_KEY: &str = "content.contentVersion";
pub const UPDATE_AVAILABLE_KEY: &str = "content.updateAvailable";

/// Storage operations the synchronizer relies on.
///
/// Implementations never retry. Failures other than "not found" surface as
/// [`ContentError::Storage`].
#[async_trait]
pub trait LocalCacheStore: Send + Sync {
    /// Returns the cached manifest, `None` when nothing is cached, or
    /// [`ContentError::CorruptCache`] when the file cannot be parsed.
    async fn read_manifest(&self) -> Result<Option<WorkoutManifest>>;

    /// Atomically replaces the cached manifest. Metadata is left untouched.
    async fn write_manifest(&self, bytes: Bytes) -> Result<()>;

    /// Deterministic location of a video. `.mp4` is appended unless the
    /// name already ends with it.
    fn video_path(&self, name: &str) -> Result<PathBuf>;

    async fn has_video(&self, name: &str) -> Result<bool>;

    /// Atomically writes a video, creating the videos directory on demand.
    async fn write_video(&self, name: &str, bytes: Bytes) -> Result<PathBuf>;

    /// Recursive size of everything under the cache root.
    async fn total_cache_size_bytes(&self) -> Result<u64>;

    /// Deletes the cache root, recreates it empty and clears the metadata.
    async fn clear_all(&self) -> Result<()>;

    async fn read_metadata(&self) -> Result<CacheMetadata>;

    async fn write_metadata(&self, metadata: &CacheMetadata) -> Result<()>;
}

/// [`LocalCacheStore`] backed by platform file system and settings bridges.
pub struct FileCacheStore {
    fs: Arc<dyn FileSystemAccess>,
    settings: Arc<dyn SettingsStore>,
    root: PathBuf,
    videos_dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        settings: Arc<dyn SettingsStore>,
        root: impl Into<PathBuf>,
    ) -> Self {
        let root = root.into();
        let videos_dir = root.join(DEFAULT_VIDEOS_DIR);
        Self {
            fs,
            settings,
            root,
            videos_dir,
        }
    }

    /// Uses `dir` (relative to the root) for videos instead of `videos/`.
    pub fn with_videos_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.videos_dir = self.root.join(dir);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE_NAME)
    }

    async fn write_atomic(&self, target: &Path, bytes: Bytes) -> Result<()> {
        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = target.with_file_name(format!("{}.tmp-{}", file_name, Uuid::new_v4()));

        self.fs.write_file(&staging, bytes).await?;
        if let Err(e) = self.fs.rename(&staging, target).await {
            if let Err(cleanup) = self.fs.delete_file(&staging).await {
                warn!(error = %cleanup, "Failed to remove staging file");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_metadata_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.settings.get_string(key).await?)
    }
}

#[async_trait]
impl LocalCacheStore for FileCacheStore {
    #[instrument(skip(self))]
    async fn read_manifest(&self) -> Result<Option<WorkoutManifest>> {
        let bytes = match self.fs.read_file(&self.manifest_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                debug!("No cached manifest");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        parse_manifest(&bytes)
            .map(Some)
            .map_err(|e| ContentError::CorruptCache(e.to_string()))
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn write_manifest(&self, bytes: Bytes) -> Result<()> {
        self.write_atomic(&self.manifest_path(), bytes).await?;
        debug!("Cached manifest");
        Ok(())
    }

    fn video_path(&self, name: &str) -> Result<PathBuf> {
        let file_name = normalize_video_file_name(name)
            .ok_or_else(|| ContentError::Decode(format!("Invalid video file name: {:?}", name)))?;
        Ok(self.videos_dir.join(file_name))
    }

    async fn has_video(&self, name: &str) -> Result<bool> {
        let path = self.video_path(name)?;
        Ok(self.fs.exists(&path).await?)
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn write_video(&self, name: &str, bytes: Bytes) -> Result<PathBuf> {
        let path = self.video_path(name)?;
        self.fs.create_dir_all(&self.videos_dir).await?;
        self.write_atomic(&path, bytes).await?;
        debug!(path = ?path, "Cached video");
        Ok(path)
    }

    async fn total_cache_size_bytes(&self) -> Result<u64> {
        if !self.fs.exists(&self.root).await? {
            return Ok(0);
        }
        Ok(self.fs.directory_size(&self.root).await?)
    }

    #[instrument(skip(self))]
    async fn clear_all(&self) -> Result<()> {
        match self.fs.delete_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.fs.create_dir_all(&self.root).await?;

        let mut tx = self.settings.begin_transaction().await?;
        for key in [LAST_SYNC_KEY, CONTENT_VERSION_KEY, UPDATE_AVAILABLE_KEY] {
            tx.delete(key).await?;
        }
        tx.commit().await?;

        info!(root = ?self.root, "Cleared content cache");
        Ok(())
    }

    async fn read_metadata(&self) -> Result<CacheMetadata> {
        let last_sync = self
            .read_metadata_value(LAST_SYNC_KEY)
            .await?
            .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(timestamp) => Some(timestamp.with_timezone(&Utc)),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable last sync timestamp");
                    None
                }
            });

        let content_version = self.read_metadata_value(CONTENT_VERSION_KEY).await?;
        let update_available = self
            .read_metadata_value(UPDATE_AVAILABLE_KEY)
            .await?
            .is_some_and(|raw| raw == "true");

        Ok(CacheMetadata {
            last_sync,
            content_version,
            update_available,
        })
    }

    async fn write_metadata(&self, metadata: &CacheMetadata) -> Result<()> {
        let mut tx = self.settings.begin_transaction().await?;

        match metadata.last_sync {
            Some(timestamp) => tx.set_string(LAST_SYNC_KEY, &timestamp.to_rfc3339()).await?,
            None => tx.delete(LAST_SYNC_KEY).await?,
        }
        match metadata.content_version.as_deref() {
            Some(version) => tx.set_string(CONTENT_VERSION_KEY, version).await?,
            None => tx.delete(CONTENT_VERSION_KEY).await?,
        }
        tx.set_string(
            UPDATE_AVAILABLE_KEY,
            if metadata.update_available { "true" } else { "false" },
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Manifest shipped with the host application.
pub struct BundledManifest {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
}

impl BundledManifest {
    pub fn new(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<WorkoutManifest> {
        let bytes = self.fs.read_file(&self.path).await?;
        parse_manifest(&bytes)
    }
}
