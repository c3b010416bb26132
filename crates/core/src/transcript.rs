//! Transcript domain types shared by the cache, the fetch seam and the service.

use serde::{Deserialize, Serialize};

/// Whether a cached response is plain text or carries timestamped segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Text,
    Segments,
}

impl Shape {
    /// Shape selected by the `include_timestamps` flag.
    pub fn from_timestamps(include_timestamps: bool) -> Self {
        if include_timestamps { Shape::Segments } else { Shape::Text }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Text => "text",
            Shape::Segments => "segments",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Shape::Text),
            "segments" => Some(Shape::Segments),
            _ => None,
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed caption line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Segment {
    /// Start offset in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub text: String,
}

/// Basic video metadata stored alongside a transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VideoMetadata {
    pub video_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    /// Upload date as `YYYYMMDD`.
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Canonical watch URL for a video.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Join segment texts into a single transcript string.
///
/// Each text is trimmed and empty ones are skipped.
pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
