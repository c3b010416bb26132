//! Upstream transcript fetch seam.
//!
//! The service only knows the [`TranscriptFetcher`] trait and the
//! [`FetchError`] taxonomy; concrete clients live in the client crate.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::transcript::{Segment, Shape, VideoMetadata};

static RETRY_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)retry-after\s*[:=]\s*(\d+)").expect("valid retry-after regex"));

/// One upstream fetch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub video_id: String,
    pub language: String,
    pub prefer_auto_generated: bool,
    pub shape: Shape,
}

/// A transcript as returned by the upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTranscript {
    /// Language code of the selected track.
    pub language: String,
    pub is_auto_generated: bool,
    pub segments: Vec<Segment>,
    pub metadata: Option<VideoMetadata>,
}

/// Upstream failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// No transcript exists for the requested language.
    #[error("no transcript found")]
    NotFound,

    /// Transcripts are disabled for the video.
    #[error("transcripts disabled")]
    Disabled,

    /// The upstream rejected the request for throughput reasons.
    #[error("rate limited: {message}")]
    RateLimited { message: String, retry_after: Option<Duration> },

    /// Anything else; surfaced verbatim.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Classify a free-form failure message.
    ///
    /// Messages that look like rate limiting become [`FetchError::RateLimited`]
    /// with any `retry-after` hint extracted; everything else is `Other`.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_rate_limit_message(&message) {
            let retry_after = parse_retry_after(&message);
            FetchError::RateLimited { message, retry_after }
        } else {
            FetchError::Other(message)
        }
    }
}

/// Whether a message reads like an upstream rate-limit rejection.
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    (lower.contains("429") && (lower.contains("too many requests") || lower.contains("http")))
        || lower.contains("rate limit")
}

/// Extract a `retry-after: N` / `retry-after=N` hint in seconds.
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    RETRY_AFTER
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Capability-typed transcript fetch function.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedTranscript, FetchError>;
}
