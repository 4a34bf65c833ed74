//! GitHub repository connector
//!
//! Implements `RemoteContentClient` on top of the contents, branches, raw and
//! LFS media endpoints.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use core_content::models::parse_manifest;
use core_content::RemoteContentClient;
use core_runtime::config::RepositorySource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{GitHubError, Result};
use crate::types::{BranchResponse, ContentsResponse, LfsPointer};

/// Media type requested from the REST API
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// GitHub rejects API requests without a user agent
const USER_AGENT: &str = concat!("skatefit-content/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body echoed into an error message
const MAX_ERROR_BODY: usize = 256;

/// GitHub content repository client
///
/// Every call makes exactly one attempt per endpoint; retry policy belongs to
/// the synchronizer.
///
/// # Example
///
/// ```ignore
/// use provider_github::GitHubContentClient;
/// use core_content::RemoteContentClient;
///
/// let client = GitHubContentClient::new(http_client, RepositorySource::default());
/// let version = client.fetch_latest_version_marker().await?;
/// ```
pub struct GitHubContentClient {
    http_client: Arc<dyn HttpClient>,
    source: RepositorySource,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl GitHubContentClient {
    pub fn new(http_client: Arc<dyn HttpClient>, source: RepositorySource) -> Self {
        Self {
            http_client,
            source,
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Clock used for cache-busting query values.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn source(&self) -> &RepositorySource {
        &self.source
    }

    fn repo_prefix(&self) -> String {
        format!(
            "{}/{}",
            urlencoding::encode(&self.source.owner),
            urlencoding::encode(&self.source.repo)
        )
    }

    pub fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}?ref={}",
            self.source.api_base.trim_end_matches('/'),
            self.repo_prefix(),
            encode_path(&self.source.manifest_path),
            urlencoding::encode(&self.source.branch)
        )
    }

    pub fn branch_url(&self) -> String {
        format!(
            "{}/repos/{}/branches/{}",
            self.source.api_base.trim_end_matches('/'),
            self.repo_prefix(),
            urlencoding::encode(&self.source.branch)
        )
    }

    fn video_repo_path(&self, file_name: &str) -> String {
        let dir = self.source.videos_dir.trim_matches('/');
        if dir.is_empty() {
            encode_path(file_name)
        } else {
            format!("{}/{}", encode_path(dir), encode_path(file_name))
        }
    }

    pub fn raw_video_url(&self, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.source.raw_base.trim_end_matches('/'),
            self.repo_prefix(),
            encode_path(&self.source.branch),
            self.video_repo_path(file_name)
        )
    }

    pub fn media_video_url(&self, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.source.media_base.trim_end_matches('/'),
            self.repo_prefix(),
            encode_path(&self.source.branch),
            self.video_repo_path(file_name)
        )
    }

    /// Appends `cache=<unix seconds>` so intermediaries cannot serve a stale body.
    fn cache_busted(&self, url: &str) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}cache={}", url, separator, self.clock.unix_timestamp())
    }

    /// Single GET; any non-2xx status becomes `ApiError`.
    #[instrument(skip(self), fields(url = %url))]
    async fn get(&self, url: String, api: bool) -> Result<HttpResponse> {
        let mut request = HttpRequest::get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(self.timeout);
        if api {
            request = request.header("Accept", GITHUB_ACCEPT);
        }

        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            debug!(status = response.status, bytes = response.body.len(), "Request succeeded");
            return Ok(response);
        }

        warn!(status = response.status, "Request failed");
        Err(GitHubError::ApiError {
            status_code: response.status,
            message: error_message(&response),
        })
    }
}

#[async_trait]
impl RemoteContentClient for GitHubContentClient {
    #[instrument(skip(self))]
    async fn fetch_manifest_bytes(&self) -> core_content::Result<Bytes> {
        let metadata = self.get(self.contents_url(), true).await?;
        let contents: ContentsResponse = serde_json::from_slice(&metadata.body)
            .map_err(|e| GitHubError::ParseError(format!("contents response: {}", e)))?;
        let download_url = contents.download_url.ok_or_else(|| {
            GitHubError::ParseError("contents response has no download_url".to_string())
        })?;

        let response = self.get(self.cache_busted(&download_url), false).await?;
        let manifest = parse_manifest(&response.body)?;
        info!(
            bytes = response.body.len(),
            containers = manifest.len(),
            "Downloaded manifest"
        );
        Ok(response.body)
    }

    #[instrument(skip(self))]
    async fn fetch_latest_version_marker(&self) -> core_content::Result<String> {
        let response = self.get(self.branch_url(), true).await?;
        let branch: BranchResponse = serde_json::from_slice(&response.body)
            .map_err(|e| GitHubError::VersionUnavailable(format!("branch response: {}", e)))?;
        let marker = branch.version_marker()?;
        debug!(marker = %marker, "Fetched version marker");
        Ok(marker)
    }

    #[instrument(skip(self))]
    async fn fetch_video_bytes(&self, file_name: &str) -> core_content::Result<Bytes> {
        let response = self.get(self.raw_video_url(file_name), false).await?;
        if !LfsPointer::is_pointer(&response.body) {
            return Ok(response.body);
        }

        let pointer = LfsPointer::parse(&response.body)?;
        debug!(oid = %pointer.oid, size = ?pointer.size, "Resolving LFS pointer");

        let media = self.get(self.media_video_url(file_name), false).await?;
        pointer.verify(&media.body)?;
        info!(file_name, bytes = media.body.len(), "Downloaded LFS video");
        Ok(media.body)
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn error_message(response: &HttpResponse) -> String {
    let body = String::from_utf8_lossy(&response.body);
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {}", response.status);
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}
