//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! settings, clock) into the content core: the GitHub client, the file cache
//! store, the synchronizer and the facade. Desktop apps typically enable the
//! `desktop-shims` feature, which lets [`CoreConfig`] fall back to the
//! adapters from `bridge-desktop` for any bridge the host leaves unset.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient,
    storage::{FileSystemAccess, SettingsStore},
    time::Clock,
};
use core_content::{BundledManifest, ContentFacade, ContentSynchronizer, FileCacheStore};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use provider_github::GitHubContentClient;
use tracing::info;

/// Capacity of the broadcast channel shared by all content components.
const EVENT_BUS_CAPACITY: usize = 256;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub filesystem: Arc<dyn FileSystemAccess>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        filesystem: Arc<dyn FileSystemAccess>,
        settings_store: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http_client,
            filesystem,
            settings_store,
            clock,
        }
    }
}

impl From<&CoreConfig> for CoreDependencies {
    fn from(config: &CoreConfig) -> Self {
        Self::new(
            Arc::clone(&config.http_client),
            Arc::clone(&config.file_system),
            Arc::clone(&config.settings_store),
            Arc::clone(&config.clock),
        )
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    deps: Arc<CoreDependencies>,
    config: Arc<CoreConfig>,
    event_bus: Arc<EventBus>,
    content: Arc<ContentFacade>,
}

impl CoreService {
    /// Assemble the content stack from a validated configuration.
    ///
    /// Nothing touches the network or the disk until [`CoreService::start`].
    pub fn new(config: CoreConfig) -> Self {
        let deps = CoreDependencies::from(&config);
        let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));

        let remote = GitHubContentClient::new(
            Arc::clone(&deps.http_client),
            config.repository.clone(),
        )
        .with_clock(Arc::clone(&deps.clock))
        .with_timeout(config.sync.request_timeout);

        let store = FileCacheStore::new(
            Arc::clone(&deps.filesystem),
            Arc::clone(&deps.settings_store),
            config.cache_root.clone(),
        )
        .with_videos_dir(&config.repository.videos_dir);

        let synchronizer = ContentSynchronizer::new(
            Arc::new(remote),
            Arc::new(store),
            Arc::clone(&deps.clock),
            config.sync,
        )
        .with_event_bus(Arc::clone(&event_bus));

        let mut content = ContentFacade::new(Arc::new(synchronizer))
            .with_event_bus(Arc::clone(&event_bus))
            .with_video_prefetch(config.features.enable_video_prefetch);
        if let Some(path) = &config.bundled_manifest_path {
            content = content
                .with_bundled_manifest(BundledManifest::new(Arc::clone(&deps.filesystem), path));
        }

        Self {
            deps: Arc::new(deps),
            config: Arc::new(config),
            event_bus,
            content: Arc::new(content),
        }
    }

    /// Loads content and, when enabled, starts periodic update checks.
    ///
    /// Load failures are reported through [`ContentFacade::status`] and the
    /// event bus rather than as an error.
    pub async fn start(&self) {
        self.content.initialize().await;
        if self.config.features.enable_periodic_update_checks {
            self.content.start_update_polling();
        }
        info!(
            cache_root = %self.config.cache_root.display(),
            polling = self.content.is_polling(),
            "Content core started"
        );
    }

    /// Content facade for the UI layer.
    pub fn content(&self) -> Arc<ContentFacade> {
        Arc::clone(&self.content)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }
}

/// Builds a service from `config` and starts it.
pub async fn bootstrap(config: CoreConfig) -> Result<CoreService> {
    let service = CoreService::new(config);
    service.start().await;
    Ok(service)
}

/// Convenience bootstrapper for desktop hosts using the default bridges and
/// the platform data directory.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// let core = core_service::bootstrap_desktop().await?;
/// let workouts = core.content().workouts().await;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop() -> Result<CoreService> {
    let config = CoreConfig::builder().build()?;
    bootstrap(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::{SqliteSettingsStore, TokioFileSystem};
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use bytes::Bytes;
    use std::path::{Path, PathBuf};

    const MANIFEST: &str = r#"[{"name":"Push Day","exercises":[
        {"section":"Main","move":"Push-up","description":"","json_file":"pushup.json",
         "video_file":"pushup","beginner":"2x5","intermediate":"3x10","advanced":"4x15"}]}]"#;

    struct GitHubStub {
        online: bool,
    }

    #[async_trait]
    impl HttpClient for GitHubStub {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            if !self.online {
                return Err(BridgeError::OperationFailed("offline".to_string()));
            }
            let body = if request.url.contains("/contents/") {
                r#"{"download_url":"https://raw.test/workouts.json"}"#.to_string()
            } else if request.url.starts_with("https://raw.test/workouts.json") {
                MANIFEST.to_string()
            } else if request.url.contains("/branches/") {
                r#"{"commit":{"sha":"0123456789abcdef"}}"#.to_string()
            } else {
                return Ok(HttpResponse::new(404, Bytes::new()));
            };
            Ok(HttpResponse::new(200, body))
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("core-service-{}", uuid::Uuid::new_v4()))
    }

    async fn config(online: bool, root: &Path) -> core_runtime::config::CoreConfigBuilder {
        CoreConfig::builder()
            .cache_root(root.join("GitHubContent"))
            .http_client(Arc::new(GitHubStub { online }))
            .file_system(Arc::new(TokioFileSystem::new()))
            .settings_store(Arc::new(SqliteSettingsStore::in_memory().await.unwrap()))
            .enable_video_prefetch(false)
    }

    #[tokio::test]
    async fn test_bootstrap_loads_remote_content() {
        let root = scratch_dir();
        let config = config(true, &root)
            .await
            .enable_periodic_update_checks(false)
            .build()
            .unwrap();

        let service = bootstrap(config).await.unwrap();
        let status = service.content().status().await;

        assert_eq!(status.workouts.len(), 1);
        assert_eq!(status.workouts[0].name, "Push Day");
        assert_eq!(status.initialization_error, None);
        assert!(status.update_available);
        assert!(!service.content().is_polling());
        assert!(root.join("GitHubContent").join("manifest.json").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_bootstrap_offline_uses_bundled_manifest() {
        let root = scratch_dir();
        std::fs::create_dir_all(&root).unwrap();
        let bundled = root.join("workouts.json");
        std::fs::write(&bundled, MANIFEST).unwrap();

        let config = config(false, &root)
            .await
            .bundled_manifest_path(&bundled)
            .build()
            .unwrap();

        let service = bootstrap(config).await.unwrap();
        let status = service.content().status().await;

        assert_eq!(status.workouts.len(), 1);
        assert_eq!(status.initialization_error, None);
        assert!(service.content().is_polling());

        service.content().stop_update_polling();
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_service_shares_one_event_bus() {
        let root = scratch_dir();
        let config = config(true, &root).await.build().unwrap();

        let service = CoreService::new(config);
        let _subscriber = service.event_bus().subscribe();

        assert_eq!(service.event_bus().subscriber_count(), 1);
        assert_eq!(service.config().repository.owner, "banddude");
        assert!(service.dependencies().clock.now().timestamp() > 0);
    }
}
