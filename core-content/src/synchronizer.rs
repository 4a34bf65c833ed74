//! # Content Synchronizer
//!
//! Decides between the cache and the network, detects new remote versions
//! and owns every retry decision.
//!
//! ## Load path
//!
//! ```text
//! load_manifest ─┬─ cache hit ──────────────> return cached
//!                │      └─ stale? ──spawn──> check_for_updates
//!                └─ miss / corrupt ─> fetch_and_cache ─> return fresh
//! ```
//!
//! `load_manifest`, `force_refresh` and `update_content` share one busy flag;
//! `check_for_updates` has its own. An overlapping call fails fast with
//! [`ContentError::AlreadyInProgress`] (or `None` for update checks) instead
//! of queueing.

use crate::error::{ContentError, Result};
use crate::guard::BusyGuard;
use crate::models::{
    normalize_video_file_name, parse_manifest, CacheInfo, CacheMetadata, WorkoutManifest,
};
use crate::remote::RemoteContentClient;
use crate::store::LocalCacheStore;
use bridge_traits::time::Clock;
use core_runtime::config::SyncPolicy;
use core_runtime::events::{ContentEvent, CoreEvent, EventBus, VideoEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Version assumed when none has been recorded yet.
pub const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Default)]
struct SyncState {
    manifest: Option<WorkoutManifest>,
    metadata: CacheMetadata,
}

/// Stateful orchestration over a [`RemoteContentClient`] and a [`LocalCacheStore`].
pub struct ContentSynchronizer {
    client: Arc<dyn RemoteContentClient>,
    store: Arc<dyn LocalCacheStore>,
    clock: Arc<dyn Clock>,
    policy: SyncPolicy,
    event_bus: Option<Arc<EventBus>>,
    state: RwLock<SyncState>,
    loading: AtomicBool,
    checking: AtomicBool,
}

impl ContentSynchronizer {
    pub fn new(
        client: Arc<dyn RemoteContentClient>,
        store: Arc<dyn LocalCacheStore>,
        clock: Arc<dyn Clock>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            client,
            store,
            clock,
            policy,
            event_bus: None,
            state: RwLock::new(SyncState::default()),
            loading: AtomicBool::new(false),
            checking: AtomicBool::new(false),
        }
    }

    /// Publish state transitions on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).ok();
        }
    }

    /// Returns the cached manifest when present, fetching it otherwise.
    ///
    /// A stale cache hit returns immediately and schedules a background
    /// update check.
    #[instrument(skip(self))]
    pub async fn load_manifest(self: &Arc<Self>) -> Result<WorkoutManifest> {
        let _guard =
            BusyGuard::acquire(&self.loading).ok_or(ContentError::AlreadyInProgress("load"))?;

        match self.store.read_manifest().await {
            Ok(Some(manifest)) => {
                let metadata = self.store.read_metadata().await?;
                let stale = metadata.is_stale(self.clock.now(), self.policy.staleness_threshold);
                {
                    let mut state = self.state.write().await;
                    state.manifest = Some(manifest.clone());
                    state.metadata = metadata;
                }

                debug!(containers = manifest.len(), stale, "Serving cached manifest");
                self.emit(CoreEvent::Content(ContentEvent::Loaded {
                    container_count: manifest.len(),
                    from_cache: true,
                }));

                if stale {
                    let this = Arc::clone(self);
                    tokio::spawn(async move {
                        this.check_for_updates().await;
                    });
                }
                return Ok(manifest);
            }
            Ok(None) => debug!("Cache miss, fetching manifest"),
            Err(e) if e.is_absence() => {
                warn!(error = %e, "Cached manifest unreadable, fetching a fresh copy");
            }
            Err(e) => return Err(e),
        }

        let manifest = self.fetch_and_cache().await?;
        self.emit(CoreEvent::Content(ContentEvent::Loaded {
            container_count: manifest.len(),
            from_cache: false,
        }));
        Ok(manifest)
    }

    /// Clears the cache and fetches the manifest again, retrying with a
    /// fixed backoff. Only the last failure is returned.
    #[instrument(skip(self))]
    pub async fn force_refresh(&self) -> Result<WorkoutManifest> {
        let _guard =
            BusyGuard::acquire(&self.loading).ok_or(ContentError::AlreadyInProgress("refresh"))?;

        self.store.clear_all().await?;
        *self.state.write().await = SyncState::default();

        let max_attempts = self.policy.refresh_max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(attempt, max_attempts, "Fetching manifest");

            match self.fetch_and_cache().await {
                Ok(manifest) => {
                    self.update_metadata(|metadata| metadata.update_available = false)
                        .await?;
                    info!(containers = manifest.len(), attempt, "Refreshed content");
                    self.emit(CoreEvent::Content(ContentEvent::Refreshed {
                        container_count: manifest.len(),
                    }));
                    return Ok(manifest);
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Refresh attempt failed");
                    self.emit(CoreEvent::Content(ContentEvent::RefreshAttemptFailed {
                        attempt,
                        max_attempts,
                        message: e.to_string(),
                    }));
                    last_error = Some(e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.refresh_backoff).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ContentError::Network("Refresh failed after all attempts".to_string())
        }))
    }

    /// Compares the remote version marker with the recorded one.
    ///
    /// Returns the new flag, or `None` when skipped because a check is
    /// already running or when anything fails. Failures leave the flag as is.
    #[instrument(skip(self))]
    pub async fn check_for_updates(&self) -> Option<bool> {
        let Some(_guard) = BusyGuard::acquire(&self.checking) else {
            debug!("Update check already in progress");
            return None;
        };

        let latest = match self.client.fetch_latest_version_marker().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(error = %e, "Update check failed");
                return None;
            }
        };

        let previous = self.state.read().await.metadata.update_available;
        let mut current = String::new();
        let result = self
            .update_metadata(|metadata| {
                current = metadata
                    .content_version
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
                metadata.update_available = latest != current;
            })
            .await;

        let metadata = match result {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "Failed to record update availability");
                return None;
            }
        };

        let available = metadata.update_available;
        debug!(current = %current, latest = %latest, available, "Update check finished");
        if available != previous {
            self.emit(CoreEvent::Content(ContentEvent::UpdateAvailabilityChanged {
                update_available: available,
                current_version: current,
                latest_version: latest,
            }));
        }
        Some(available)
    }

    /// Fetches the manifest and records the remote version as current.
    #[instrument(skip(self))]
    pub async fn update_content(&self) -> Result<WorkoutManifest> {
        let _guard =
            BusyGuard::acquire(&self.loading).ok_or(ContentError::AlreadyInProgress("update"))?;

        let manifest = self.fetch_and_cache().await?;
        let version = self.client.fetch_latest_version_marker().await?;
        let now = self.clock.now();

        self.update_metadata(|metadata| {
            metadata.content_version = Some(version.clone());
            metadata.last_sync = Some(now);
            metadata.update_available = false;
        })
        .await?;

        info!(version = %version, "Content updated");
        self.emit(CoreEvent::Content(ContentEvent::ContentUpdated { version }));
        Ok(manifest)
    }

    /// Path of a cached video, downloading it first when missing.
    #[instrument(skip(self))]
    pub async fn ensure_video(&self, name: &str) -> Result<PathBuf> {
        let path = self.store.video_path(name)?;
        if self.store.has_video(name).await? {
            debug!(path = ?path, "Video already cached");
            return Ok(path);
        }

        let file_name = normalize_video_file_name(name)
            .ok_or_else(|| ContentError::Decode(format!("Invalid video file name: {:?}", name)))?;
        let bytes = self.client.fetch_video_bytes(&file_name).await?;
        let size = bytes.len() as u64;
        let path = self.store.write_video(name, bytes).await?;

        info!(file_name = %file_name, size, "Video cached");
        self.emit(CoreEvent::Video(VideoEvent::Downloaded {
            file_name,
            bytes: size,
        }));
        Ok(path)
    }

    pub async fn is_video_cached(&self, name: &str) -> Result<bool> {
        self.store.has_video(name).await
    }

    /// Removes every cached file and all metadata.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<()> {
        self.store.clear_all().await?;
        *self.state.write().await = SyncState::default();
        self.emit(CoreEvent::Content(ContentEvent::CacheCleared));
        Ok(())
    }

    pub async fn cache_info(&self) -> Result<CacheInfo> {
        let size = self.store.total_cache_size_bytes().await?;
        let metadata = self.store.read_metadata().await?;
        Ok(CacheInfo::new(size, metadata.last_sync))
    }

    pub async fn manifest(&self) -> Option<WorkoutManifest> {
        self.state.read().await.manifest.clone()
    }

    pub async fn metadata(&self) -> CacheMetadata {
        self.state.read().await.metadata.clone()
    }

    pub async fn update_available(&self) -> bool {
        self.state.read().await.metadata.update_available
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::Acquire)
    }

    /// Fetch, validate, persist, then stamp the sync time.
    async fn fetch_and_cache(&self) -> Result<WorkoutManifest> {
        let bytes = self.client.fetch_manifest_bytes().await?;
        let manifest = parse_manifest(&bytes)?;
        self.store.write_manifest(bytes).await?;

        let now = self.clock.now();
        self.update_metadata(|metadata| metadata.last_sync = Some(now))
            .await?;

        self.state.write().await.manifest = Some(manifest.clone());
        debug!(containers = manifest.len(), "Manifest cached");
        Ok(manifest)
    }

    /// Read-modify-write of the persisted metadata, mirrored in memory on success.
    async fn update_metadata<F>(&self, apply: F) -> Result<CacheMetadata>
    where
        F: FnOnce(&mut CacheMetadata) + Send,
    {
        let mut metadata = self.store.read_metadata().await?;
        apply(&mut metadata);
        self.store.write_metadata(&metadata).await?;
        self.state.write().await.metadata = metadata.clone();
        Ok(metadata)
    }
}
