//! # Content Error Types
//!
//! Error taxonomy shared by the cache store, the remote client and the
//! synchronizer.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur while loading, caching or refreshing content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// Transport-level failure (DNS, connect, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A remote payload was malformed.
    #[error("Malformed content: {0}")]
    Decode(String),

    /// The repository did not report a usable version marker.
    #[error("Version unavailable: {0}")]
    VersionUnavailable(String),

    // ========================================================================
    // Local Errors
    // ========================================================================
    /// The cached manifest exists but cannot be parsed.
    #[error("Corrupt cache: {0}")]
    CorruptCache(String),

    /// File system or metadata store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Concurrency
    // ========================================================================
    /// Another call of the named operation is still running.
    #[error("{0} already in progress")]
    AlreadyInProgress(&'static str),
}

impl ContentError {
    /// Transport failures, throttling and server errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ContentError::Network(_) => true,
            ContentError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Malformed data is treated like missing data and triggers a re-fetch.
    pub fn is_absence(&self) -> bool {
        matches!(self, ContentError::Decode(_) | ContentError::CorruptCache(_))
    }
}

impl From<BridgeError> for ContentError {
    fn from(error: BridgeError) -> Self {
        ContentError::Storage(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ContentError::Network("reset".into()).is_retryable());
        assert!(ContentError::Http {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(ContentError::Http {
            status: 429,
            message: "rate limited".into()
        }
        .is_retryable());
        assert!(!ContentError::Http {
            status: 404,
            message: "missing".into()
        }
        .is_retryable());
        assert!(!ContentError::Storage("disk full".into()).is_retryable());
    }

    #[test]
    fn test_absence_classification() {
        assert!(ContentError::Decode("not json".into()).is_absence());
        assert!(ContentError::CorruptCache("truncated".into()).is_absence());
        assert!(!ContentError::VersionUnavailable("no sha".into()).is_absence());
    }

    #[test]
    fn test_bridge_errors_become_storage_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: ContentError = BridgeError::Io(io).into();
        assert!(matches!(error, ContentError::Storage(message) if message.contains("denied")));
    }

    #[test]
    fn test_in_progress_message() {
        assert_eq!(
            ContentError::AlreadyInProgress("refresh").to_string(),
            "refresh already in progress"
        );
    }
}
