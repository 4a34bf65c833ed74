//! Remote Content Client capability.
//!
//! Implemented by provider crates. Implementations make exactly one request
//! attempt per call and never cache; retry policy belongs to the synchronizer.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait RemoteContentClient: Send + Sync {
    /// Downloads the current manifest, bypassing edge caches.
    ///
    /// The returned bytes are guaranteed to parse as a manifest.
    async fn fetch_manifest_bytes(&self) -> Result<Bytes>;

    /// Short identifier of the repository head, used to detect new content.
    async fn fetch_latest_version_marker(&self) -> Result<String>;

    /// Downloads a video by file name, resolving large-file-storage pointers.
    async fn fetch_video_bytes(&self, file_name: &str) -> Result<Bytes>;
}
