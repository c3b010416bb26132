//! YouTube transcript client.
//!
//! Obtains the player response for a video, picks a caption track and
//! downloads it as `json3` timed text.
//!
//! ### Player sources
//!
//! - **InnerTube** (`innertube` feature): `POST /youtubei/v1/player` with an
//!   Android client context. Used by the LIBRARY fetch method.
//! - **Watch page**: `GET /watch?v=ID` and extract the embedded
//!   `ytInitialPlayerResponse`. Used by the API and SCRAPE methods.
//!
//! HTTP 429 (with its `Retry-After` header), captcha pages and bot checks are
//! reported as rate limits; missing caption tracks as disabled transcripts.

pub mod error;
pub mod player;
pub mod timedtext;

pub use error::YouTubeError;
pub use player::{CaptionTrack, PlayerResponse, select_track};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use ytscribe_core::{AppConfig, FetchError, FetchMethod, FetchRequest, FetchedTranscript, TranscriptFetcher};

const WATCH_URL: &str = "https://www.youtube.com/watch";

#[cfg(feature = "innertube")]
const INNERTUBE_PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player?prettyPrint=false";

#[cfg(feature = "innertube")]
const ANDROID_CLIENT_VERSION: &str = "20.10.38";

#[cfg(feature = "innertube")]
const ANDROID_USER_AGENT: &str = "com.google.android.youtube/20.10.38 (Linux; U; Android 14) gzip";

/// Where the player response comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSource {
    #[cfg(feature = "innertube")]
    InnerTube,
    WatchPage,
}

impl PlayerSource {
    /// Source used for a fetch method.
    pub fn for_method(method: FetchMethod) -> Self {
        match method {
            #[cfg(feature = "innertube")]
            FetchMethod::Library => PlayerSource::InnerTube,
            _ => PlayerSource::WatchPage,
        }
    }
}

/// Configuration for the YouTube client.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout: Duration,
    pub source: PlayerSource,
}

impl YouTubeConfig {
    pub fn from_app_config(config: &AppConfig, method: FetchMethod) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
            timeout: config.timeout(),
            source: PlayerSource::for_method(method),
        }
    }
}

/// HTTP client for YouTube transcripts.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: Client,
    config: YouTubeConfig,
}

impl YouTubeClient {
    pub fn new(config: YouTubeConfig) -> Result<Self, YouTubeError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn source(&self) -> PlayerSource {
        self.config.source
    }

    /// Fetch and parse the transcript for one request.
    pub async fn fetch_transcript(&self, request: &FetchRequest) -> Result<FetchedTranscript, YouTubeError> {
        let start = Instant::now();
        let player = self.player_response(&request.video_id).await?;
        player.check_playability()?;

        let tracks = player.caption_tracks()?;
        let track = select_track(tracks, &request.language, request.prefer_auto_generated)
            .ok_or_else(|| YouTubeError::NoTranscript(request.language.clone()))?;

        let segments = self.timed_text(track).await?;

        tracing::debug!(
            video_id = %request.video_id,
            lang = %track.language_code,
            auto = track.is_auto_generated(),
            segments = segments.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "transcript fetched"
        );

        Ok(FetchedTranscript {
            language: track.language_code.clone(),
            is_auto_generated: track.is_auto_generated(),
            segments,
            metadata: player.metadata(&request.video_id),
        })
    }

    async fn player_response(&self, video_id: &str) -> Result<PlayerResponse, YouTubeError> {
        match self.config.source {
            #[cfg(feature = "innertube")]
            PlayerSource::InnerTube => self.innertube_player(video_id).await,
            PlayerSource::WatchPage => self.watch_page_player(video_id).await,
        }
    }

    #[cfg(feature = "innertube")]
    async fn innertube_player(&self, video_id: &str) -> Result<PlayerResponse, YouTubeError> {
        let body = innertube_body(video_id, &self.config.accept_language);
        let response = self
            .http
            .post(INNERTUBE_PLAYER_URL)
            .header(header::USER_AGENT, ANDROID_USER_AGENT)
            .header(header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .json(&body)
            .send()
            .await?;

        let bytes = check_status(response)?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| YouTubeError::Parse(format!("invalid player response: {e}")))
    }

    async fn watch_page_player(&self, video_id: &str) -> Result<PlayerResponse, YouTubeError> {
        let response = self
            .http
            .get(WATCH_URL)
            .query(&[("v", video_id), ("hl", "en")])
            .header(header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        let html = check_status(response)?.text().await?;
        PlayerResponse::from_watch_page(&html)
    }

    async fn timed_text(&self, track: &CaptionTrack) -> Result<Vec<ytscribe_core::Segment>, YouTubeError> {
        let url = timedtext::json3_url(&track.base_url)?;
        let response = self
            .http
            .get(url)
            .header(header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .send()
            .await?;

        let body = check_status(response)?.text().await?;
        timedtext::parse_json3(&body)
    }
}

#[async_trait]
impl TranscriptFetcher for YouTubeClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedTranscript, FetchError> {
        self.fetch_transcript(request).await.map_err(|e| {
            tracing::debug!(video_id = %request.video_id, error = %e, "youtube fetch failed");
            FetchError::from(e)
        })
    }
}

#[cfg(feature = "innertube")]
fn innertube_body(video_id: &str, accept_language: &str) -> serde_json::Value {
    let hl = accept_language
        .split([',', ';', '-'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("en");

    serde_json::json!({
        "context": {
            "client": {
                "clientName": "ANDROID",
                "clientVersion": ANDROID_CLIENT_VERSION,
                "androidSdkVersion": 34,
                "hl": hl,
            }
        },
        "videoId": video_id,
        "contentCheckOk": true,
        "racyCheckOk": true,
    })
}

/// Reject throttled and failed responses.
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, YouTubeError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after(response.headers());
        return Err(YouTubeError::RateLimited { message: "HTTP 429 Too Many Requests".into(), retry_after });
    }

    if status.is_client_error() || status.is_server_error() {
        return Err(YouTubeError::HttpError { status: status.as_u16() });
    }

    Ok(response)
}

/// `Retry-After` in delta-seconds form.
fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
