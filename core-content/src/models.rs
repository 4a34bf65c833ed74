//! # Content Data Model
//!
//! Wire types of the workout manifest plus the cache metadata persisted next
//! to it.

use crate::error::{ContentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Ordered list of containers exactly as published by the repository.
pub type WorkoutManifest = Vec<WorkoutContainer>;

/// Icon used when a container does not name one.
pub const DEFAULT_ICON: &str = "figure.run";

/// Extension appended to video references that carry none.
pub const VIDEO_EXTENSION: &str = "mp4";

// ============================================================================
// Manifest
// ============================================================================

/// A named group of exercises, rendered as one card by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutContainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub exercises: Vec<WorkoutExercise>,
}

impl WorkoutContainer {
    pub fn icon_or_default(&self) -> &str {
        self.icon
            .as_deref()
            .filter(|icon| !icon.trim().is_empty())
            .unwrap_or(DEFAULT_ICON)
    }

    pub fn color_tag(&self) -> ColorTag {
        self.color
            .as_deref()
            .map(ColorTag::parse)
            .unwrap_or_default()
    }

    /// Non-empty video references of this container, in manifest order.
    pub fn video_files(&self) -> Vec<&str> {
        self.exercises
            .iter()
            .filter_map(WorkoutExercise::video_reference)
            .collect()
    }
}

/// One move with per-difficulty instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub section: String,
    #[serde(rename = "move")]
    pub move_name: String,
    pub description: String,
    pub json_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_file: Option<String>,
    pub beginner: String,
    pub intermediate: String,
    pub advanced: String,
}

impl WorkoutExercise {
    pub fn instructions(&self, difficulty: Difficulty) -> &str {
        match difficulty {
            Difficulty::Beginner => &self.beginner,
            Difficulty::Intermediate => &self.intermediate,
            Difficulty::Advanced => &self.advanced,
        }
    }

    pub fn section_kind(&self) -> Section {
        Section::parse(&self.section)
    }

    /// The explicit video reference, or `None` when absent or blank.
    pub fn video_reference(&self) -> Option<&str> {
        self.video_file
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Name used to look the video up: the explicit reference, else the
    /// exercise's JSON file name without its `.json` suffix.
    pub fn video_file_name(&self) -> String {
        match self.video_reference() {
            Some(name) => name.to_string(),
            None => self
                .json_file
                .strip_suffix(".json")
                .unwrap_or(&self.json_file)
                .to_string(),
        }
    }
}

/// Where an exercise sits within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    WarmUp,
    Main,
    CoolDown,
    Other(String),
}

impl Section {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("warm-up") {
            Section::WarmUp
        } else if trimmed.eq_ignore_ascii_case("main") {
            Section::Main
        } else if trimmed.eq_ignore_ascii_case("cool-down") {
            Section::CoolDown
        } else {
            Section::Other(trimmed.to_string())
        }
    }
}

/// Accent color tag of a container. Unknown tags fall back to gray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorTag {
    Blue,
    Orange,
    Purple,
    Teal,
    Green,
    Red,
    Yellow,
    Pink,
    #[default]
    Gray,
}

impl ColorTag {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "blue" => ColorTag::Blue,
            "orange" => ColorTag::Orange,
            "purple" => ColorTag::Purple,
            "teal" => ColorTag::Teal,
            "green" => ColorTag::Green,
            "red" => ColorTag::Red,
            "yellow" => ColorTag::Yellow,
            "pink" => ColorTag::Pink,
            _ => ColorTag::Gray,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Difficulty {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(ContentError::Decode(format!("Unknown difficulty: {}", other))),
        }
    }
}

/// Parses manifest bytes, rejecting anything that is not an array of containers.
pub fn parse_manifest(bytes: &[u8]) -> Result<WorkoutManifest> {
    serde_json::from_slice(bytes)
        .map_err(|e| ContentError::Decode(format!("Invalid workout manifest: {}", e)))
}

/// Deduplicated, sorted list of explicit video references across the manifest.
pub fn referenced_video_files(manifest: &[WorkoutContainer]) -> Vec<String> {
    manifest
        .iter()
        .flat_map(WorkoutContainer::video_files)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Reduces a caller-supplied video name to a bare file name inside the
/// videos directory, appending `.mp4` unless it already ends in `.mp4`
/// (any case). Other extensions are kept as part of the stem.
///
/// Returns `None` for names with no usable final component.
pub fn normalize_video_file_name(name: &str) -> Option<String> {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();

    if last.is_empty() || last == "." || last == ".." {
        return None;
    }

    let suffix = format!(".{}", VIDEO_EXTENSION);
    let has_suffix = last.len() > suffix.len()
        && last
            .get(last.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(&suffix));

    if has_suffix {
        Some(last.to_string())
    } else {
        Some(format!("{}{}", last, suffix))
    }
}

// ============================================================================
// Cache Metadata
// ============================================================================

/// Persisted state describing the cached manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheMetadata {
    pub last_sync: Option<DateTime<Utc>>,
    pub content_version: Option<String>,
    pub update_available: bool,
}

impl CacheMetadata {
    /// True when never synced or when the last sync is older than `threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        let Some(last_sync) = self.last_sync else {
            return true;
        };
        match chrono::Duration::from_std(threshold) {
            Ok(threshold) => now.signed_duration_since(last_sync) > threshold,
            Err(_) => false,
        }
    }
}

/// Size and freshness summary shown in settings screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub size_bytes: u64,
    pub size_description: String,
    pub last_sync: Option<DateTime<Utc>>,
}

impl CacheInfo {
    pub fn new(size_bytes: u64, last_sync: Option<DateTime<Utc>>) -> Self {
        Self {
            size_bytes,
            size_description: format_byte_count(size_bytes),
            last_sync,
        }
    }
}

/// Human readable size in decimal units, e.g. `"512 bytes"` or `"1.5 MB"`.
pub fn format_byte_count(bytes: u64) -> String {
    const UNITS: [(&str, usize); 5] = [("KB", 0), ("MB", 1), ("GB", 2), ("TB", 2), ("PB", 2)];

    match bytes {
        0 => return "Zero KB".to_string(),
        1 => return "1 byte".to_string(),
        n if n < 1000 => return format!("{} bytes", n),
        _ => {}
    }

    let mut value = bytes as f64 / 1000.0;
    let mut unit = 0;
    while value >= 999.5 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let (label, precision) = UNITS[unit];
    let rendered = format!("{:.*}", precision, value);
    let rendered = if rendered.contains('.') {
        rendered.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        rendered
    };
    format!("{} {}", rendered, label)
}
