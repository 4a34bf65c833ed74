//! # Content Core
//!
//! Caches the workout manifest and its videos locally and keeps them in step
//! with the remote content repository.
//!
//! - [`store`]: durable cache layout and metadata
//! - [`remote`]: the capability a provider implements to reach the repository
//! - [`synchronizer`]: cache-or-fetch, refresh with retry, update detection
//! - [`facade`]: busy flags, bundled fallback, video prefetch and polling

pub mod error;
pub mod facade;
mod guard;
pub mod models;
pub mod remote;
pub mod store;
pub mod synchronizer;

pub use error::{ContentError, Result};
pub use facade::{ContentFacade, ContentStatus, VideoBatchReport};
pub use models::{
    CacheInfo, CacheMetadata, ColorTag, Difficulty, Section, WorkoutContainer, WorkoutExercise,
    WorkoutManifest,
};
pub use remote::RemoteContentClient;
pub use store::{BundledManifest, FileCacheStore, LocalCacheStore};
pub use synchronizer::ContentSynchronizer;
