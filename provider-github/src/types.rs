//! GitHub API response types and Git LFS pointer handling

use crate::error::{GitHubError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// First line of every Git LFS pointer file
pub const LFS_SPEC_SIGNATURE: &str = "version https://git-lfs.github.com/spec/v1";

/// Pointer files are tiny; anything larger is a real payload.
const MAX_POINTER_SIZE: usize = 1024;

/// Number of commit SHA characters used as the version marker
pub const VERSION_MARKER_LEN: usize = 8;

/// Contents API file resource
///
/// See: https://docs.github.com/en/rest/repos/contents#get-repository-content
#[derive(Debug, Clone, Deserialize)]
pub struct ContentsResponse {
    pub name: Option<String>,
    pub path: Option<String>,
    pub sha: Option<String>,
    pub size: Option<u64>,

    /// Direct download location of the file body
    pub download_url: Option<String>,
}

/// Branches API resource
///
/// See: https://docs.github.com/en/rest/branches/branches#get-a-branch
#[derive(Debug, Clone, Deserialize)]
pub struct BranchResponse {
    pub name: Option<String>,
    pub commit: Option<BranchCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchCommit {
    pub sha: Option<String>,
}

impl BranchResponse {
    /// Short form of the head commit SHA.
    pub fn version_marker(&self) -> Result<String> {
        let sha = self
            .commit
            .as_ref()
            .and_then(|commit| commit.sha.as_deref())
            .ok_or_else(|| {
                GitHubError::VersionUnavailable("Branch response has no commit sha".to_string())
            })?;

        if sha.len() < VERSION_MARKER_LEN || !sha.is_char_boundary(VERSION_MARKER_LEN) {
            return Err(GitHubError::VersionUnavailable(format!(
                "Commit sha too short: {:?}",
                sha
            )));
        }
        Ok(sha[..VERSION_MARKER_LEN].to_string())
    }
}

/// Parsed Git LFS pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsPointer {
    /// Lowercase hex SHA-256 of the real payload
    pub oid: String,

    /// Declared payload size, when present
    pub size: Option<u64>,
}

impl LfsPointer {
    /// Whether `body` is a pointer file rather than real content.
    pub fn is_pointer(body: &[u8]) -> bool {
        if body.len() > MAX_POINTER_SIZE {
            return false;
        }
        let start = body
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(body.len());
        body[start..].starts_with(LFS_SPEC_SIGNATURE.as_bytes())
    }

    /// Parses the `oid sha256:` and `size` lines of a pointer file.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| GitHubError::LfsPointerInvalid(format!("not UTF-8: {}", e)))?;

        let mut oid = None;
        let mut size = None;
        for line in text.lines().map(str::trim) {
            if let Some(value) = line.strip_prefix("oid sha256:") {
                oid = Some(value.trim().to_ascii_lowercase());
            } else if let Some(value) = line.strip_prefix("size ") {
                size = Some(value.trim().parse::<u64>().map_err(|e| {
                    GitHubError::LfsPointerInvalid(format!("bad size {:?}: {}", value, e))
                })?);
            }
        }

        let oid = oid
            .filter(|oid| oid.len() == 64 && oid.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| GitHubError::LfsPointerInvalid("missing sha256 oid".to_string()))?;

        Ok(Self { oid, size })
    }

    /// Checks a resolved payload against the declared size and digest.
    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        if Self::is_pointer(payload) {
            return Err(GitHubError::ParseError(
                "LFS media endpoint returned another pointer".to_string(),
            ));
        }

        if let Some(expected) = self.size {
            if payload.len() as u64 != expected {
                return Err(GitHubError::ParseError(format!(
                    "LFS payload size mismatch: expected {} bytes, got {}",
                    expected,
                    payload.len()
                )));
            }
        }

        let digest = format!("{:x}", Sha256::digest(payload));
        if digest != self.oid {
            return Err(GitHubError::ParseError(format!(
                "LFS payload digest mismatch: expected {}, got {}",
                self.oid, digest
            )));
        }
        Ok(())
    }
}
