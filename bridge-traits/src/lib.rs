//! # Host Bridge Traits
//!
//! Capabilities the content core needs from its host: an HTTP transport,
//! file access for the cache, a settings store for cache metadata, a clock,
//! and an optional sink for log forwarding.
//!
//! `bridge-desktop` implements them with reqwest, `tokio::fs` and SQLite.
//! Mobile hosts supply their own.
//!
//! Every implementation reports failures as [`BridgeError`]. A missing file
//! must stay an `Io` error of kind `NotFound`; the cache relies on
//! [`BridgeError::is_not_found`] to tell "not cached yet" from a real fault.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use storage::{FileMetadata, FileSystemAccess, SettingsStore, SettingsTransaction};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
