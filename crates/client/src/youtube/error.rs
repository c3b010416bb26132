//! YouTube client error types.

use std::sync::Arc;
use std::time::Duration;

use ytscribe_core::FetchError;

/// Errors from the YouTube player and timed-text endpoints.
#[derive(Debug, Clone, thiserror::Error)]
pub enum YouTubeError {
    /// Upstream throttled the request (HTTP 429, captcha or bot check).
    #[error("{message}")]
    RateLimited { message: String, retry_after: Option<Duration> },

    /// The video has no caption tracks at all.
    #[error("transcripts are disabled for this video")]
    TranscriptsDisabled,

    /// No caption track matches the requested language.
    #[error("no transcript found for language {0}")]
    NoTranscript(String),

    /// The player refused to serve the video.
    #[error("video unavailable: {0}")]
    Unplayable(String),

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for YouTubeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { YouTubeError::Timeout } else { YouTubeError::Network(Arc::new(err)) }
    }
}

impl From<YouTubeError> for FetchError {
    fn from(err: YouTubeError) -> Self {
        match err {
            YouTubeError::RateLimited { message, retry_after } => FetchError::RateLimited { message, retry_after },
            YouTubeError::TranscriptsDisabled => FetchError::Disabled,
            YouTubeError::NoTranscript(_) => FetchError::NotFound,
            other => FetchError::from_message(other.to_string()),
        }
    }
}
