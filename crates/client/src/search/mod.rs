//! Video search backends.
//!
//! - [`YtDlpSearcher`]: `yt-dlp` flat-playlist search, available without keys.
//! - [`DataApiSearcher`]: YouTube Data API `search.list`, used when the server
//!   runs with an API key.

pub mod data_api;
pub mod ytdlp;

pub use data_api::DataApiSearcher;
pub use ytdlp::YtDlpSearcher;

use std::sync::Arc;
use std::time::Duration;

use ytscribe_core::{AppConfig, FetchMethod, VideoSearcher};

/// Errors from search backends.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The yt-dlp executable could not be found.
    #[error("yt-dlp not found: {0}")]
    NotFound(String),

    /// The search command exited unsuccessfully.
    #[error("yt-dlp exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("search timed out after {0:?}")]
    Timeout(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Data API error response.
    #[error("YouTube Data API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<SearchError> for ytscribe_core::Error {
    fn from(err: SearchError) -> Self {
        ytscribe_core::Error::SearchFailed(err.to_string())
    }
}

/// Pick the search backend for the detected fetch method.
///
/// The Data API is used only when it is the fetch method and a key is set;
/// everything else goes through yt-dlp.
pub fn build_searcher(config: &AppConfig, method: FetchMethod) -> Result<Arc<dyn VideoSearcher>, SearchError> {
    match (method, config.api_key()) {
        (FetchMethod::Api, Some(key)) => {
            tracing::info!(backend = "youtube_data_api", "search backend selected");
            Ok(Arc::new(DataApiSearcher::new(key, config)?))
        }
        _ => {
            tracing::info!(backend = "yt-dlp", program = %config.ytdlp_path, "search backend selected");
            Ok(Arc::new(YtDlpSearcher::new(&config.ytdlp_path)))
        }
    }
}
