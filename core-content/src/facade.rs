//! # Content Facade
//!
//! Host-facing entry point. Wraps the synchronizer with busy flags, the
//! bundled-manifest fallback, video prefetch and periodic update polling.
//!
//! The host observes changes through [`CoreEvent`]s on the event bus or by
//! polling [`ContentFacade::status`].

use crate::error::ContentError;
use crate::guard::BusyGuard;
use crate::models::{referenced_video_files, CacheInfo, WorkoutManifest};
use crate::store::BundledManifest;
use crate::synchronizer::ContentSynchronizer;
use core_runtime::events::{ContentEvent, CoreEvent, EventBus, VideoEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Snapshot of everything the UI renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentStatus {
    pub is_initializing: bool,
    pub is_refreshing: bool,
    pub initialization_error: Option<String>,
    pub update_available: bool,
    pub workouts: WorkoutManifest,
}

/// Outcome of a sequential video download batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoBatchReport {
    pub downloaded: usize,
    pub already_cached: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct FacadeState {
    initialization_error: Option<String>,
    workouts: WorkoutManifest,
}

/// Loads, refreshes and prefetches content on behalf of the host UI.
///
/// The facade never calls [`ContentSynchronizer::update_content`], so it
/// never records a content version. After every launch and every refresh
/// the recorded version is still "unknown", and the next update check
/// reports an update. Hosts that offer an "update now" action call
/// `update_content` through [`ContentFacade::synchronizer`].
pub struct ContentFacade {
    synchronizer: Arc<ContentSynchronizer>,
    bundled: Option<BundledManifest>,
    event_bus: Option<Arc<EventBus>>,
    video_prefetch: bool,
    initializing: AtomicBool,
    refreshing: AtomicBool,
    state: RwLock<FacadeState>,
    polling: Mutex<Option<JoinHandle<()>>>,
}

impl ContentFacade {
    pub fn new(synchronizer: Arc<ContentSynchronizer>) -> Self {
        Self {
            synchronizer,
            bundled: None,
            event_bus: None,
            video_prefetch: true,
            initializing: AtomicBool::new(false),
            refreshing: AtomicBool::new(false),
            state: RwLock::new(FacadeState::default()),
            polling: Mutex::new(None),
        }
    }

    /// Manifest served when neither the cache nor the network can provide one.
    pub fn with_bundled_manifest(mut self, bundled: BundledManifest) -> Self {
        self.bundled = Some(bundled);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Whether a successful refresh downloads every referenced video.
    pub fn with_video_prefetch(mut self, enabled: bool) -> Self {
        self.video_prefetch = enabled;
        self
    }

    pub fn synchronizer(&self) -> &Arc<ContentSynchronizer> {
        &self.synchronizer
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).ok();
        }
    }

    /// Loads content for display. Overlapping calls return immediately.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        let Some(_guard) = BusyGuard::acquire(&self.initializing) else {
            debug!("Initialization already in progress");
            return;
        };

        self.emit(CoreEvent::Content(ContentEvent::LoadStarted));
        self.state.write().await.initialization_error = None;

        match self.synchronizer.load_manifest().await {
            Ok(manifest) => {
                self.state.write().await.workouts = manifest;
                self.synchronizer.check_for_updates().await;
            }
            Err(ContentError::AlreadyInProgress(operation)) => {
                debug!(operation, "Synchronizer busy, skipping initialization");
            }
            Err(e) => self.fall_back_to_bundled(e).await,
        }
    }

    async fn fall_back_to_bundled(&self, error: ContentError) {
        warn!(error = %error, "Failed to load workout content");

        if let Some(bundled) = &self.bundled {
            match bundled.load().await {
                Ok(manifest) => {
                    info!(containers = manifest.len(), "Serving bundled workout content");
                    self.state.write().await.workouts = manifest;
                    self.emit(CoreEvent::Content(ContentEvent::LoadFailed {
                        message: error.to_string(),
                        fell_back_to_bundled: true,
                    }));
                    return;
                }
                Err(bundled_error) => {
                    warn!(error = %bundled_error, "Bundled workout content unavailable");
                }
            }
        }

        let message = format!("Failed to load workout content: {}", error);
        self.state.write().await.initialization_error = Some(message.clone());
        self.emit(CoreEvent::Content(ContentEvent::LoadFailed {
            message,
            fell_back_to_bundled: false,
        }));
    }

    /// Discards the cache and reloads from the network, then prefetches videos.
    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        let Some(_guard) = BusyGuard::acquire(&self.refreshing) else {
            debug!("Refresh already in progress");
            return;
        };

        {
            let mut state = self.state.write().await;
            state.initialization_error = None;
            state.workouts.clear();
        }

        match self.synchronizer.force_refresh().await {
            Ok(manifest) => {
                self.state.write().await.workouts = manifest;
                if self.video_prefetch {
                    // Detached: the batch reports through events and logs.
                    drop(self.download_all_videos());
                }
            }
            Err(ContentError::AlreadyInProgress(operation)) => {
                debug!(operation, "Synchronizer busy, skipping refresh");
                if let Some(manifest) = self.synchronizer.manifest().await {
                    self.state.write().await.workouts = manifest;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh content");
                self.state.write().await.initialization_error =
                    Some(format!("Failed to refresh content: {}", e));
            }
        }
    }

    /// Downloads every referenced video that is not cached yet, one at a time.
    ///
    /// Individual failures are logged and counted; the batch always runs to
    /// the end.
    pub fn download_all_videos(&self) -> JoinHandle<VideoBatchReport> {
        let synchronizer = Arc::clone(&self.synchronizer);
        let event_bus = self.event_bus.clone();

        tokio::spawn(async move {
            let manifest = synchronizer.manifest().await.unwrap_or_default();
            let mut report = VideoBatchReport::default();

            for name in referenced_video_files(&manifest) {
                if matches!(synchronizer.is_video_cached(&name).await, Ok(true)) {
                    report.already_cached += 1;
                    continue;
                }

                match synchronizer.ensure_video(&name).await {
                    Ok(_) => report.downloaded += 1,
                    Err(e) => {
                        warn!(file_name = %name, error = %e, "Video download failed");
                        report.failed += 1;
                        if let Some(bus) = &event_bus {
                            bus.emit(CoreEvent::Video(VideoEvent::DownloadFailed {
                                file_name: name.clone(),
                                message: e.to_string(),
                            }))
                            .ok();
                        }
                    }
                }
            }

            info!(
                downloaded = report.downloaded,
                already_cached = report.already_cached,
                failed = report.failed,
                "Video batch finished"
            );
            if let Some(bus) = &event_bus {
                bus.emit(CoreEvent::Video(VideoEvent::BatchCompleted {
                    downloaded: report.downloaded,
                    already_cached: report.already_cached,
                    failed: report.failed,
                }))
                .ok();
            }
            report
        })
    }

    pub async fn cache_info(&self) -> Result<CacheInfo, ContentError> {
        self.synchronizer.cache_info().await
    }

    /// Wipes the cache and metadata, then loads content again.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<(), ContentError> {
        self.synchronizer.clear_cache().await?;
        *self.state.write().await = FacadeState::default();
        self.initialize().await;
        Ok(())
    }

    /// Checks for updates every `update_check_interval` while the facade is alive.
    ///
    /// Replaces any polling task started earlier.
    pub fn start_update_polling(self: &Arc<Self>) {
        let period = self.synchronizer.policy().update_check_interval;
        let facade: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(facade) = facade.upgrade() else {
                    break;
                };
                debug!("Periodic update check");
                facade.synchronizer.check_for_updates().await;
            }
        });

        if let Some(previous) = self.polling_slot().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_update_polling(&self) {
        if let Some(handle) = self.polling_slot().take() {
            handle.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.polling_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn polling_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.polling
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn status(&self) -> ContentStatus {
        let state = self.state.read().await;
        ContentStatus {
            is_initializing: self.initializing.load(Ordering::Acquire),
            is_refreshing: self.refreshing.load(Ordering::Acquire),
            initialization_error: state.initialization_error.clone(),
            update_available: self.synchronizer.update_available().await,
            workouts: state.workouts.clone(),
        }
    }

    pub async fn workouts(&self) -> WorkoutManifest {
        self.state.read().await.workouts.clone()
    }
}

impl Drop for ContentFacade {
    fn drop(&mut self) {
        let slot = match self.polling.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}
