//! # GitHub Content Provider
//!
//! Implements `RemoteContentClient` against a GitHub-hosted content repository.
//!
//! ## Overview
//!
//! This module provides:
//! - Manifest download through the contents API `download_url`, with cache busting
//! - Version markers taken from the branch head commit
//! - Video downloads from raw storage, resolving Git LFS pointers through the
//!   media host and verifying the payload against the pointer

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GitHubContentClient;
pub use error::{GitHubError, Result};
pub use types::LfsPointer;
