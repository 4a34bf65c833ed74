//! Cache store behaviour against the desktop file system and SQLite settings.

mod common;

use bridge_desktop::{SqliteSettingsStore, TokioFileSystem};
use bridge_traits::time::SystemClock;
use bytes::Bytes;
use common::{manifest, FakeRemote, MANIFEST_JSON};
use core_content::{ContentSynchronizer, FileCacheStore, LocalCacheStore};
use core_runtime::config::SyncPolicy;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

struct Scratch {
    base: PathBuf,
    store: Arc<FileCacheStore>,
}

impl Scratch {
    async fn new() -> Self {
        let base = std::env::temp_dir().join(format!("core-content-it-{}", Uuid::new_v4()));
        let settings = SqliteSettingsStore::in_memory().await.unwrap();
        let store = FileCacheStore::new(
            Arc::new(TokioFileSystem::new()),
            Arc::new(settings),
            base.join("GitHubContent"),
        );
        Self {
            base,
            store: Arc::new(store),
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.base);
    }
}

#[tokio::test]
async fn test_manifest_round_trip() {
    let scratch = Scratch::new().await;

    scratch
        .store
        .write_manifest(Bytes::from_static(MANIFEST_JSON.as_bytes()))
        .await
        .unwrap();

    assert_eq!(scratch.store.read_manifest().await.unwrap(), Some(manifest()));
}

#[tokio::test]
async fn test_clear_all_leaves_empty_cache() {
    let scratch = Scratch::new().await;
    let store = &scratch.store;

    store
        .write_manifest(Bytes::from_static(MANIFEST_JSON.as_bytes()))
        .await
        .unwrap();
    store
        .write_video("squat", Bytes::from(vec![7u8; 2048]))
        .await
        .unwrap();
    assert!(store.total_cache_size_bytes().await.unwrap() > 2048);

    store.clear_all().await.unwrap();

    assert_eq!(store.read_manifest().await.unwrap(), None);
    assert_eq!(store.total_cache_size_bytes().await.unwrap(), 0);
    assert!(!store.has_video("squat").await.unwrap());
    assert!(store.root().is_dir());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cache_size_while_videos_are_written() {
    let scratch = Scratch::new().await;
    let store = Arc::clone(&scratch.store);

    let writer = tokio::spawn(async move {
        for i in 0..400 {
            store
                .write_video(&format!("clip{}", i % 8), Bytes::from(vec![1u8; 256]))
                .await
                .unwrap();
        }
    });

    let mut samples = 0;
    while !writer.is_finished() {
        scratch.store.total_cache_size_bytes().await.unwrap();
        samples += 1;
    }
    writer.await.unwrap();

    assert!(samples > 0);
    assert_eq!(scratch.store.total_cache_size_bytes().await.unwrap(), 8 * 256);
}

#[tokio::test]
async fn test_uncached_video_downloads_once() {
    let scratch = Scratch::new().await;
    let remote = Arc::new(
        FakeRemote::serving(MANIFEST_JSON).with_video("squat.mp4", Ok(Bytes::from_static(b"mp4"))),
    );
    let sync = ContentSynchronizer::new(
        remote.clone(),
        scratch.store.clone(),
        Arc::new(SystemClock),
        SyncPolicy::default(),
    );

    let first = sync.ensure_video("squat").await.unwrap();
    assert_eq!(first, scratch.store.root().join("videos").join("squat.mp4"));
    assert_eq!(std::fs::read(&first).unwrap(), b"mp4");

    let second = sync.ensure_video("squat").await.unwrap();
    assert_eq!(second, first);
    assert_eq!(remote.video_calls(), 1);
}

#[tokio::test]
async fn test_fetched_manifest_is_persisted_without_version() {
    let scratch = Scratch::new().await;
    let remote = Arc::new(FakeRemote::serving(MANIFEST_JSON));
    let sync = Arc::new(ContentSynchronizer::new(
        remote.clone(),
        scratch.store.clone(),
        Arc::new(SystemClock),
        SyncPolicy::default(),
    ));

    sync.load_manifest().await.unwrap();

    let metadata = scratch.store.read_metadata().await.unwrap();
    assert!(metadata.last_sync.is_some());
    assert_eq!(metadata.content_version, None);

    let info = sync.cache_info().await.unwrap();
    assert_eq!(info.size_bytes, MANIFEST_JSON.len() as u64);
    assert_eq!(info.last_sync, metadata.last_sync);
}
