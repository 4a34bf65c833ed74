//! # Content Events
//!
//! The synchronizer and facade announce state changes on a shared
//! [`EventBus`]; hosts subscribe instead of polling the facade.
//!
//! ```rust
//! use core_runtime::events::{ContentEvent, CoreEvent, EventBus};
//!
//! let bus = EventBus::new(16);
//! let mut ui = bus.subscribe();
//!
//! bus.emit(CoreEvent::Content(ContentEvent::Loaded {
//!     container_count: 4,
//!     from_cache: true,
//! }))
//! .ok();
//!
//! assert!(ui.try_recv().is_ok());
//! ```
//!
//! Delivery is best effort. A subscriber that falls more than the bus
//! capacity behind gets `RecvError::Lagged` and resumes with newer events.
//! Publishers ignore the error returned when nobody is subscribed.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Capacity used by `EventBus::default()`.
const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Content(ContentEvent),
    Video(VideoEvent),
}

impl CoreEvent {
    /// Failures without a fallback are errors; degraded outcomes are
    /// warnings; completed loads and updates are info.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Content(ContentEvent::LoadFailed {
                fell_back_to_bundled: false,
                ..
            }) => EventSeverity::Error,
            CoreEvent::Content(
                ContentEvent::LoadFailed { .. } | ContentEvent::RefreshAttemptFailed { .. },
            )
            | CoreEvent::Video(VideoEvent::DownloadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Content(
                ContentEvent::Loaded { .. }
                | ContentEvent::Refreshed { .. }
                | ContentEvent::ContentUpdated { .. }
                | ContentEvent::UpdateAvailabilityChanged { .. },
            ) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

impl fmt::Display for CoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreEvent::Content(event) => f.write_str(event.summary()),
            CoreEvent::Video(event) => f.write_str(event.summary()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events describing the lifecycle of the workout manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ContentEvent {
    /// Initial load has begun.
    LoadStarted,
    /// Manifest is available to the host.
    Loaded {
        /// Number of workout containers in the manifest.
        container_count: usize,
        /// Whether the manifest came from the local cache.
        from_cache: bool,
    },
    /// Initial load failed.
    LoadFailed {
        /// Human-readable error message.
        message: String,
        /// Whether the bundled manifest was served instead.
        fell_back_to_bundled: bool,
    },
    /// One forced refresh attempt failed; another may follow.
    RefreshAttemptFailed {
        /// 1-based attempt number.
        attempt: u32,
        /// Total attempts allowed.
        max_attempts: u32,
        /// Human-readable error message.
        message: String,
    },
    /// Forced refresh completed.
    Refreshed {
        /// Number of workout containers in the new manifest.
        container_count: usize,
    },
    /// The update-available flag flipped.
    UpdateAvailabilityChanged {
        update_available: bool,
        /// Version recorded locally, `"unknown"` if none.
        current_version: String,
        /// Version reported by the remote repository.
        latest_version: String,
    },
    /// Explicit update finished and the new version was recorded.
    ContentUpdated {
        version: String,
    },
    /// Every cached file and all metadata were removed.
    CacheCleared,
}

impl ContentEvent {
    fn summary(&self) -> &'static str {
        match self {
            ContentEvent::LoadStarted => "Loading workout content",
            ContentEvent::Loaded { .. } => "Workout content loaded",
            ContentEvent::LoadFailed { .. } => "Workout content failed to load",
            ContentEvent::RefreshAttemptFailed { .. } => "Refresh attempt failed",
            ContentEvent::Refreshed { .. } => "Workout content refreshed",
            ContentEvent::UpdateAvailabilityChanged { .. } => "Update availability changed",
            ContentEvent::ContentUpdated { .. } => "Workout content updated",
            ContentEvent::CacheCleared => "Content cache cleared",
        }
    }
}

/// Events related to the local video cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum VideoEvent {
    /// A video was fetched and written to the cache.
    Downloaded {
        file_name: String,
        /// Size of the cached payload in bytes.
        bytes: u64,
    },
    /// A single video failed to download. The batch continues.
    DownloadFailed {
        file_name: String,
        message: String,
    },
    /// A sequential prefetch batch finished.
    BatchCompleted {
        downloaded: usize,
        already_cached: usize,
        failed: usize,
    },
}

impl VideoEvent {
    fn summary(&self) -> &'static str {
        match self {
            VideoEvent::Downloaded { .. } => "Video cached",
            VideoEvent::DownloadFailed { .. } => "Video download failed",
            VideoEvent::BatchCompleted { .. } => "Video batch completed",
        }
    }
}

/// Broadcast channel shared by every publisher and subscriber.
///
/// Each subscriber gets its own copy of every event emitted after it
/// subscribed. Cloning the bus adds a publisher.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is how many events a subscriber may fall behind before lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Number of subscribers that received `event`. Fails when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

type Predicate = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Subscription that skips events rejected by an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let videos = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Video(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    predicate: Option<Predicate>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            predicate: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    fn wants(&self, event: &CoreEvent) -> bool {
        self.predicate.as_ref().map_or(true, |keep| keep(event))
    }

    /// Waits for the next accepted event. Lag and closure are passed through.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }

    /// `None` once the buffered events are exhausted.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(Ok(event)),
                Ok(_) => {}
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.predicate.is_some())
            .finish()
    }
}
