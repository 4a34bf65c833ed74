//! Error types for the GitHub provider

use core_content::ContentError;
use thiserror::Error;

/// GitHub provider errors
#[derive(Error, Debug)]
pub enum GitHubError {
    /// Transport failed before a response arrived
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request completed with a non-success status
    #[error("GitHub API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Body looked like an LFS pointer but could not be used
    #[error("Invalid LFS pointer: {0}")]
    LfsPointerInvalid(String),

    /// Branch head could not be turned into a version marker
    #[error("Version unavailable: {0}")]
    VersionUnavailable(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, GitHubError>;

impl From<GitHubError> for ContentError {
    fn from(error: GitHubError) -> Self {
        match error {
            GitHubError::NetworkError(msg) => ContentError::Network(msg),
            GitHubError::ApiError {
                status_code,
                message,
            } => ContentError::Http {
                status: status_code,
                message,
            },
            GitHubError::ParseError(msg) => ContentError::Decode(msg),
            GitHubError::LfsPointerInvalid(msg) => {
                ContentError::Decode(format!("Invalid LFS pointer: {}", msg))
            }
            GitHubError::VersionUnavailable(msg) => ContentError::VersionUnavailable(msg),
            // The HTTP bridge only fails on transport problems.
            GitHubError::BridgeError(e) => ContentError::Network(e.to_string()),
        }
    }
}
