//! # Configuration
//!
//! [`CoreConfig`] bundles the host bridges with the content settings: which
//! repository to mirror, where the cache lives, and the refresh timings.
//! [`CoreConfigBuilder::build`] validates everything up front, so a bad
//! value fails at startup and not on the first sync.
//!
//! Under `desktop-shims`, any bridge left unset falls back to the
//! `bridge-desktop` implementation and the cache root to the platform data
//! directory. Without it a missing bridge is [`Error::CapabilityMissing`].
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .cache_root("/path/to/GitHubContent")
//!     .bundled_manifest_path("/app/resources/workouts.json")
//!     .sync_policy(SyncPolicy {
//!         staleness_threshold: Duration::from_secs(600),
//!         ..SyncPolicy::default()
//!     })
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, FileSystemAccess, HttpClient, SettingsStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Largest backoff accepted between forced refresh attempts.
const MAX_REFRESH_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client used by the remote content client
    pub http_client: Arc<dyn HttpClient>,

    /// File system access for the content cache
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Key-value store holding cache metadata
    pub settings_store: Arc<dyn SettingsStore>,

    /// Time source for staleness checks and cache busting
    pub clock: Arc<dyn Clock>,

    /// Directory holding the cached manifest and the `videos/` subdirectory
    pub cache_root: PathBuf,

    /// Remote repository that publishes the content
    pub repository: RepositorySource,

    /// Refresh and polling timings
    pub sync: SyncPolicy,

    /// Manifest shipped with the host application, served when nothing else loads
    pub bundled_manifest_path: Option<PathBuf>,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("clock", &"Clock { ... }")
            .field("cache_root", &self.cache_root)
            .field("repository", &self.repository)
            .field("sync", &self.sync)
            .field("bundled_manifest_path", &self.bundled_manifest_path)
            .field("features", &self.features)
            .finish()
    }
}

/// Location of the content repository and the hosts that serve it.
///
/// # Example
///
/// ```
/// use core_runtime::config::RepositorySource;
///
/// let source = RepositorySource::new("acme", "drills").with_branch("staging");
/// assert_eq!(source.manifest_path, "workouts.json");
/// assert_eq!(source.branch, "staging");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySource {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Path of the manifest inside the repository
    pub manifest_path: String,
    /// Directory inside the repository that holds the videos
    pub videos_dir: String,
    /// Base URL of the repository metadata API
    pub api_base: String,
    /// Base URL serving raw file contents
    pub raw_base: String,
    /// Base URL serving large-file-storage payloads
    pub media_base: String,
}

impl RepositorySource {
    /// Creates a source for `owner/repo` with the default branch, paths and hosts.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            ..Self::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<String>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_videos_dir(mut self, dir: impl Into<String>) -> Self {
        self.videos_dir = dir.into();
        self
    }

    /// Points every base URL at one host. Used by tests against a local server.
    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        raw_base: impl Into<String>,
        media_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.raw_base = raw_base.into();
        self.media_base = media_base.into();
        self
    }
}

impl Default for RepositorySource {
    fn default() -> Self {
        Self {
            owner: "banddude".to_string(),
            repo: "skate-fit-files".to_string(),
            branch: "main".to_string(),
            manifest_path: "workouts.json".to_string(),
            videos_dir: "videos".to_string(),
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            media_base: "https://media.githubusercontent.com/media".to_string(),
        }
    }
}

/// Timing policy for cache freshness, forced refresh and update polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Age after which a cached manifest triggers a background update check
    pub staleness_threshold: Duration,

    /// Total fetch attempts made by a forced refresh
    pub refresh_max_attempts: u32,

    /// Fixed sleep between forced refresh attempts
    pub refresh_backoff: Duration,

    /// Period of the background update check
    pub update_check_interval: Duration,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::from_secs(60 * 60),
            refresh_max_attempts: 3,
            refresh_backoff: Duration::from_millis(500),
            update_check_interval: Duration::from_secs(30 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Optional background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Poll the remote version marker on `update_check_interval`
    pub enable_periodic_update_checks: bool,

    /// Download every referenced video after a successful forced refresh
    pub enable_video_prefetch: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_periodic_update_checks: true,
            enable_video_prefetch: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Directory holding cached videos.
    pub fn videos_dir(&self) -> PathBuf {
        self.cache_root.join(&self.repository.videos_dir)
    }

    /// Rejects an empty cache root or repository coordinate, zero refresh
    /// attempts, a zero update interval and a backoff above one minute.
    pub fn validate(&self) -> Result<()> {
        if self.cache_root.as_os_str().is_empty() {
            return Err(Error::Config("Cache root cannot be empty".to_string()));
        }

        for (label, value) in [
            ("Repository owner", &self.repository.owner),
            ("Repository name", &self.repository.repo),
            ("Repository branch", &self.repository.branch),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", label)));
            }
        }

        if self.sync.refresh_max_attempts == 0 {
            return Err(Error::Config(
                "Refresh attempts must be at least 1".to_string(),
            ));
        }

        if self.sync.update_check_interval.is_zero() {
            return Err(Error::Config(
                "Update check interval must be greater than zero. \
                 Disable periodic checks via FeatureFlags instead."
                    .to_string(),
            ));
        }

        if self.sync.refresh_backoff > MAX_REFRESH_BACKOFF {
            return Err(Error::Config(format!(
                "Refresh backoff exceeds maximum of {}s",
                MAX_REFRESH_BACKOFF.as_secs()
            )));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str, mobile: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: ensure the 'desktop-shims' feature is enabled to use the default. \
             Mobile: inject {}.",
            capability, purpose, mobile
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_cache_root() -> Result<PathBuf> {
    Ok(bridge_desktop::TokioFileSystem::default_content_root())
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_cache_root() -> Result<PathBuf> {
    Err(Error::Config(
        "Cache root is required. Use .cache_root() to set it.".to_string(),
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to initialize default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "fetching remote content",
        "URLSession/OkHttp backed clients",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing(
        "FileSystemAccess",
        "the content cache",
        "sandboxed file access for the app container",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(cache_root: &std::path::Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;

    let db_path = cache_root
        .parent()
        .unwrap_or(cache_root)
        .join("content-settings.db");
    let open = move || -> Result<SqliteSettingsStore> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| Error::Internal(format!("Settings store runtime: {}", e)))?;
        runtime
            .block_on(SqliteSettingsStore::new(db_path))
            .map_err(|e| Error::Internal(format!("Failed to open settings store: {}", e)))
    };

    // Blocking inside a running runtime panics; open from a helper thread instead.
    let store = if tokio::runtime::Handle::try_current().is_ok() {
        std::thread::scope(|scope| scope.spawn(open).join())
            .map_err(|_| Error::Internal("Settings store thread panicked".to_string()))??
    } else {
        open()?
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(
    _cache_root: &std::path::Path,
) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "cache metadata persistence",
        "platform-native settings (UserDefaults/DataStore)",
    ))
}

/// Collects overrides; [`build`](CoreConfigBuilder::build) fills defaults and validates.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    cache_root: Option<PathBuf>,
    repository: Option<RepositorySource>,
    sync: Option<SyncPolicy>,
    bundled_manifest_path: Option<PathBuf>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Directory that will hold `workouts.json` and `videos/`.
    pub fn cache_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_root = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the remote repository.
    ///
    /// ```
    /// use core_runtime::config::{CoreConfig, RepositorySource};
    ///
    /// let builder = CoreConfig::builder()
    ///     .repository(RepositorySource::new("acme", "drills"));
    /// ```
    pub fn repository(mut self, repository: RepositorySource) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Sets refresh and polling timings.
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync = Some(policy);
        self
    }

    /// Sets the manifest served when neither cache nor network can load content.
    pub fn bundled_manifest_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.bundled_manifest_path = Some(path.into());
        self
    }

    /// Enables or disables periodic update checks.
    pub fn enable_periodic_update_checks(mut self, enabled: bool) -> Self {
        self.features.enable_periodic_update_checks = enabled;
        self
    }

    /// Enables or disables video prefetch after a forced refresh.
    pub fn enable_video_prefetch(mut self, enabled: bool) -> Self {
        self.features.enable_video_prefetch = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Fails when a bridge has no default on this build or a value is invalid.
    pub fn build(self) -> Result<CoreConfig> {
        let cache_root = match self.cache_root {
            Some(root) => root,
            None => provide_default_cache_root()?,
        };

        let sync = self.sync.unwrap_or_default();

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(sync.request_timeout)?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&cache_root)?,
        };

        let config = CoreConfig {
            http_client,
            file_system,
            settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cache_root,
            repository: self.repository.unwrap_or_default(),
            sync,
            bundled_manifest_path: self.bundled_manifest_path,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use bridge_traits::storage::{FileMetadata, SettingsTransaction};
    use bytes::Bytes;
    use std::path::Path;

    #[cfg(feature = "desktop-shims")]
    use uuid::Uuid;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            unimplemented!()
        }
    }

    struct MockFileSystem;

    #[async_trait]
    impl FileSystemAccess for MockFileSystem {
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            unimplemented!()
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn read_file(&self, _path: &Path) -> BridgeResult<Bytes> {
            unimplemented!()
        }
        async fn write_file(&self, _path: &Path, _data: Bytes) -> BridgeResult<()> {
            Ok(())
        }
        async fn rename(&self, _from: &Path, _to: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_file(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_directory(&self, _path: &Path) -> BridgeResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    struct MockSettingsStore;

    #[async_trait]
    impl SettingsStore for MockSettingsStore {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn begin_transaction(&self) -> BridgeResult<Box<dyn SettingsTransaction + Send>> {
            Ok(Box::new(MockTransaction))
        }
    }

    struct MockTransaction;

    #[async_trait]
    impl SettingsTransaction for MockTransaction {
        async fn set_string(&mut self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete(&mut self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn commit(self: Box<Self>) -> BridgeResult<()> {
            Ok(())
        }
        async fn rollback(self: Box<Self>) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn mocked_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .file_system(Arc::new(MockFileSystem))
            .settings_store(Arc::new(MockSettingsStore))
    }

    #[test]
    fn test_builder_with_all_bridges_uses_defaults() {
        let config = mocked_builder()
            .cache_root("/cache/GitHubContent")
            .build()
            .unwrap();

        assert_eq!(config.cache_root, PathBuf::from("/cache/GitHubContent"));
        assert_eq!(config.videos_dir(), PathBuf::from("/cache/GitHubContent/videos"));
        assert_eq!(config.repository, RepositorySource::default());
        assert_eq!(config.sync.staleness_threshold, Duration::from_secs(3600));
        assert_eq!(config.sync.refresh_max_attempts, 3);
        assert_eq!(config.sync.refresh_backoff, Duration::from_millis(500));
        assert_eq!(config.sync.update_check_interval, Duration::from_secs(1800));
        assert!(config.features.enable_periodic_update_checks);
        assert!(config.bundled_manifest_path.is_none());
    }

    #[test]
    fn test_default_repository_points_at_content_repo() {
        let source = RepositorySource::default();
        assert_eq!(source.owner, "banddude");
        assert_eq!(source.repo, "skate-fit-files");
        assert_eq!(source.branch, "main");
        assert_eq!(source.media_base, "https://media.githubusercontent.com/media");
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_cache_root() {
        let err = mocked_builder().build().unwrap_err();
        assert!(err.to_string().contains("Cache root is required"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let err = CoreConfig::builder()
            .cache_root("/cache")
            .file_system(Arc::new(MockFileSystem))
            .settings_store(Arc::new(MockSettingsStore))
            .build()
            .unwrap_err();

        match err {
            Error::CapabilityMissing { capability, .. } => assert_eq!(capability, "HttpClient"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_settings_store() {
        let err = CoreConfig::builder()
            .cache_root("/cache")
            .http_client(Arc::new(MockHttpClient))
            .file_system(Arc::new(MockFileSystem))
            .build()
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("SettingsStore"));
        assert!(message.contains("cache metadata"));
    }

    #[test]
    fn test_validate_rejects_empty_cache_root() {
        let err = mocked_builder().cache_root("").build().unwrap_err();
        assert!(err.to_string().contains("Cache root cannot be empty"));
    }

    #[test]
    fn test_validate_rejects_blank_branch() {
        let err = mocked_builder()
            .cache_root("/cache")
            .repository(RepositorySource::default().with_branch("  "))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Repository branch cannot be empty"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let err = mocked_builder()
            .cache_root("/cache")
            .sync_policy(SyncPolicy {
                refresh_max_attempts: 0,
                ..SyncPolicy::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let err = mocked_builder()
            .cache_root("/cache")
            .sync_policy(SyncPolicy {
                update_check_interval: Duration::ZERO,
                ..SyncPolicy::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Update check interval"));
    }

    #[test]
    fn test_validate_rejects_excessive_backoff() {
        let err = mocked_builder()
            .cache_root("/cache")
            .sync_policy(SyncPolicy {
                refresh_backoff: Duration::from_secs(61),
                ..SyncPolicy::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Refresh backoff exceeds maximum of 60s"));
    }

    #[test]
    fn test_feature_flag_setters() {
        let config = mocked_builder()
            .cache_root("/cache")
            .enable_periodic_update_checks(false)
            .enable_video_prefetch(false)
            .bundled_manifest_path("/app/workouts.json")
            .build()
            .unwrap();

        assert!(!config.features.enable_periodic_update_checks);
        assert!(!config.features.enable_video_prefetch);
        assert_eq!(
            config.bundled_manifest_path,
            Some(PathBuf::from("/app/workouts.json"))
        );
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = mocked_builder().cache_root("/cache").build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("HttpClient { ... }"));
        assert!(rendered.contains("cache_root"));
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_build_with_desktop_defaults_inside_runtime() {
        let base = std::env::temp_dir().join(format!("core-runtime-test-{}", Uuid::new_v4()));
        let cache_root = base.join("GitHubContent");

        let config = CoreConfig::builder()
            .cache_root(&cache_root)
            .build()
            .expect("desktop defaults should succeed inside runtime");

        config
            .settings_store
            .set_string("content.contentVersion", "abc12345")
            .await
            .unwrap();
        let value = config
            .settings_store
            .get_string("content.contentVersion")
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("abc12345"));
        assert!(base.join("content-settings.db").exists());

        drop(config);
        let _ = tokio::fs::remove_dir_all(&base).await;
    }
}
