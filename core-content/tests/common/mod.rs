//! Test doubles shared by the content integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use core_content::models::{normalize_video_file_name, parse_manifest};
use core_content::{
    CacheMetadata, ContentError, LocalCacheStore, RemoteContentClient, Result, WorkoutManifest,
};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const MANIFEST_JSON: &str = r#"[
    {
        "name": "Leg Day",
        "icon": "figure.skating",
        "color": "orange",
        "exercises": [
            {
                "section": "Warm-up",
                "move": "Squat",
                "description": "Bodyweight squat",
                "json_file": "squat.json",
                "video_file": "squat",
                "beginner": "2x10",
                "intermediate": "3x12",
                "advanced": "4x15"
            },
            {
                "section": "Main",
                "move": "Lunge",
                "description": "Alternating lunge",
                "json_file": "lunge.json",
                "video_file": "lunge",
                "beginner": "2x8",
                "intermediate": "3x10",
                "advanced": "4x12"
            },
            {
                "section": "Cool-down",
                "move": "Calf stretch",
                "description": "Wall calf stretch",
                "json_file": "calf.json",
                "video_file": "calf",
                "beginner": "20s",
                "intermediate": "30s",
                "advanced": "45s"
            }
        ]
    }
]"#;

pub fn manifest() -> WorkoutManifest {
    parse_manifest(MANIFEST_JSON.as_bytes()).unwrap()
}

/// Scripted remote: queued manifest responses are served first, then the default.
pub struct FakeRemote {
    manifest_script: Mutex<VecDeque<Result<Bytes>>>,
    default_manifest: Mutex<Result<Bytes>>,
    version: Mutex<Result<String>>,
    videos: Mutex<HashMap<String, Result<Bytes>>>,
    delay: Duration,
    version_delay: Duration,
    pub manifest_calls: AtomicUsize,
    pub version_calls: AtomicUsize,
    pub video_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn serving(manifest_json: &str) -> Self {
        Self {
            manifest_script: Mutex::new(VecDeque::new()),
            default_manifest: Mutex::new(Ok(Bytes::from(manifest_json.to_string()))),
            version: Mutex::new(Ok("abc12345".to_string())),
            videos: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            version_delay: Duration::ZERO,
            manifest_calls: AtomicUsize::new(0),
            version_calls: AtomicUsize::new(0),
            video_calls: AtomicUsize::new(0),
        }
    }

    pub fn offline() -> Self {
        let remote = Self::serving("[]");
        *remote.default_manifest.lock().unwrap() =
            Err(ContentError::Network("connection refused".to_string()));
        *remote.version.lock().unwrap() =
            Err(ContentError::Network("connection refused".to_string()));
        remote
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_version_delay(mut self, delay: Duration) -> Self {
        self.version_delay = delay;
        self
    }

    pub fn then_manifest(self, response: Result<Bytes>) -> Self {
        self.manifest_script.lock().unwrap().push_back(response);
        self
    }

    pub fn with_video(self, file_name: &str, response: Result<Bytes>) -> Self {
        self.videos
            .lock()
            .unwrap()
            .insert(file_name.to_string(), response);
        self
    }

    pub fn set_version(&self, version: Result<String>) {
        *self.version.lock().unwrap() = version;
    }

    pub fn manifest_calls(&self) -> usize {
        self.manifest_calls.load(Ordering::SeqCst)
    }

    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    pub fn video_calls(&self) -> usize {
        self.video_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteContentClient for FakeRemote {
    async fn fetch_manifest_bytes(&self) -> Result<Bytes> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.manifest_script.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => self.default_manifest.lock().unwrap().clone(),
        }
    }

    async fn fetch_latest_version_marker(&self) -> Result<String> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        if !self.version_delay.is_zero() {
            tokio::time::sleep(self.version_delay).await;
        }
        self.version.lock().unwrap().clone()
    }

    async fn fetch_video_bytes(&self, file_name: &str) -> Result<Bytes> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        self.videos
            .lock()
            .unwrap()
            .get(file_name)
            .cloned()
            .unwrap_or_else(|| {
                Err(ContentError::Http {
                    status: 404,
                    message: format!("{} not found", file_name),
                })
            })
    }
}

/// In-memory [`LocalCacheStore`] for tests that do not need real files.
#[derive(Default)]
pub struct MemoryStore {
    manifest: Mutex<Option<Bytes>>,
    videos: Mutex<HashMap<String, Bytes>>,
    metadata: Mutex<CacheMetadata>,
}

impl MemoryStore {
    pub fn seeded(manifest_json: &str, metadata: CacheMetadata) -> Self {
        Self {
            manifest: Mutex::new(Some(Bytes::from(manifest_json.to_string()))),
            videos: Mutex::new(HashMap::new()),
            metadata: Mutex::new(metadata),
        }
    }

    pub fn seed_video(&self, name: &str) {
        let key = normalize_video_file_name(name).unwrap();
        self.videos
            .lock()
            .unwrap()
            .insert(key, Bytes::from_static(b"cached"));
    }

    pub fn stored_metadata(&self) -> CacheMetadata {
        self.metadata.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalCacheStore for MemoryStore {
    async fn read_manifest(&self) -> Result<Option<WorkoutManifest>> {
        let bytes = self.manifest.lock().unwrap().clone();
        match bytes {
            Some(bytes) => parse_manifest(&bytes)
                .map(Some)
                .map_err(|e| ContentError::CorruptCache(e.to_string())),
            None => Ok(None),
        }
    }

    async fn write_manifest(&self, bytes: Bytes) -> Result<()> {
        *self.manifest.lock().unwrap() = Some(bytes);
        Ok(())
    }

    fn video_path(&self, name: &str) -> Result<PathBuf> {
        normalize_video_file_name(name)
            .map(|file_name| PathBuf::from("/memory/videos").join(file_name))
            .ok_or_else(|| ContentError::Decode(format!("Invalid video file name: {:?}", name)))
    }

    async fn has_video(&self, name: &str) -> Result<bool> {
        let key = normalize_video_file_name(name).unwrap_or_default();
        Ok(self.videos.lock().unwrap().contains_key(&key))
    }

    async fn write_video(&self, name: &str, bytes: Bytes) -> Result<PathBuf> {
        let path = self.video_path(name)?;
        let key = normalize_video_file_name(name).unwrap_or_default();
        self.videos.lock().unwrap().insert(key, bytes);
        Ok(path)
    }

    async fn total_cache_size_bytes(&self) -> Result<u64> {
        let manifest = self
            .manifest
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |bytes| bytes.len() as u64);
        let videos: u64 = self
            .videos
            .lock()
            .unwrap()
            .values()
            .map(|bytes| bytes.len() as u64)
            .sum();
        Ok(manifest + videos)
    }

    async fn clear_all(&self) -> Result<()> {
        *self.manifest.lock().unwrap() = None;
        self.videos.lock().unwrap().clear();
        *self.metadata.lock().unwrap() = CacheMetadata::default();
        Ok(())
    }

    async fn read_metadata(&self) -> Result<CacheMetadata> {
        Ok(self.metadata.lock().unwrap().clone())
    }

    async fn write_metadata(&self, metadata: &CacheMetadata) -> Result<()> {
        *self.metadata.lock().unwrap() = metadata.clone();
        Ok(())
    }
}
