//! # Desktop Bridges
//!
//! What `core-runtime` falls back to under the `desktop-shims` feature:
//! reqwest for HTTP, `tokio::fs` for the cache directory and a SQLite table
//! for cache metadata.
//!
//! ```ignore
//! let http = ReqwestHttpClient::new()?;
//! let settings = SqliteSettingsStore::new(root.join("content-settings.db")).await?;
//! let fs = TokioFileSystem::new();
//! ```

mod filesystem;
mod http;
mod settings;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
