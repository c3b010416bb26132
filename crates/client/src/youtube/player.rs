//! Player response parsing: playability, caption tracks and video details.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use ytscribe_core::VideoMetadata;
use ytscribe_core::transcript::watch_url;

use super::error::YouTubeError;
use crate::date::compact_date;

static PLAYER_RESPONSE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ytInitialPlayerResponse\s*=\s*\{").expect("valid player response regex"));

/// Subset of the InnerTube player response used for transcripts.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    #[serde(default)]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    pub captions: Option<Captions>,
    #[serde(default)]
    pub video_details: Option<VideoDetails>,
    #[serde(default)]
    pub microformat: Option<Microformat>,
}

#[derive(Debug, Deserialize)]
pub struct PlayabilityStatus {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer", default)]
    pub tracklist: Option<CaptionTracklist>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTracklist {
    #[serde(default)]
    pub caption_tracks: Vec<CaptionTrack>,
}

/// One caption track offered by the player.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    /// `asr` for automatic speech recognition tracks.
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Decimal string.
    #[serde(default)]
    pub length_seconds: Option<String>,
    /// Decimal string.
    #[serde(default)]
    pub view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Microformat {
    #[serde(rename = "playerMicroformatRenderer", default)]
    pub renderer: Option<MicroformatRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroformatRenderer {
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
}

impl PlayerResponse {
    /// Extract the embedded `ytInitialPlayerResponse` object from a watch page.
    pub fn from_watch_page(html: &str) -> Result<Self, YouTubeError> {
        if html.contains("class=\"g-recaptcha\"") {
            return Err(YouTubeError::RateLimited {
                message: "HTTP 429 Too Many Requests: captcha challenge on watch page".into(),
                retry_after: None,
            });
        }

        let start = PLAYER_RESPONSE_START
            .find(html)
            .ok_or_else(|| YouTubeError::Parse("ytInitialPlayerResponse not found in watch page".into()))?;

        // The object is followed by more script; take only the first JSON value.
        let json = &html[start.end() - 1..];
        match serde_json::Deserializer::from_str(json).into_iter::<PlayerResponse>().next() {
            Some(Ok(player)) => Ok(player),
            Some(Err(e)) => Err(YouTubeError::Parse(format!("invalid player response: {e}"))),
            None => Err(YouTubeError::Parse("empty player response".into())),
        }
    }

    /// Map a non-OK playability status to an error.
    pub fn check_playability(&self) -> Result<(), YouTubeError> {
        let Some(playability) = &self.playability_status else {
            return Ok(());
        };
        let reason = playability.reason.clone().unwrap_or_else(|| playability.status.clone());

        match playability.status.as_str() {
            "OK" => Ok(()),
            "LOGIN_REQUIRED" if reason.to_lowercase().contains("not a bot") => Err(YouTubeError::RateLimited {
                message: format!("rate limit: bot check ({reason})"),
                retry_after: None,
            }),
            _ => Err(YouTubeError::Unplayable(reason)),
        }
    }

    /// Caption tracks, or `TranscriptsDisabled` when there are none.
    pub fn caption_tracks(&self) -> Result<&[CaptionTrack], YouTubeError> {
        self.captions
            .as_ref()
            .and_then(|c| c.tracklist.as_ref())
            .map(|t| t.caption_tracks.as_slice())
            .filter(|tracks| !tracks.is_empty())
            .ok_or(YouTubeError::TranscriptsDisabled)
    }

    pub fn metadata(&self, video_id: &str) -> Option<VideoMetadata> {
        let details = self.video_details.as_ref()?;
        let upload_date = self
            .microformat
            .as_ref()
            .and_then(|m| m.renderer.as_ref())
            .and_then(|r| r.upload_date.as_deref().or(r.publish_date.as_deref()))
            .and_then(compact_date);

        let video_id = if details.video_id.is_empty() { video_id } else { details.video_id.as_str() };

        Some(VideoMetadata {
            video_id: video_id.to_string(),
            title: details.title.clone(),
            channel: details.author.clone(),
            upload_date,
            duration_seconds: details.length_seconds.as_deref().and_then(|s| s.parse().ok()),
            view_count: details.view_count.as_deref().and_then(|s| s.parse().ok()),
            url: Some(watch_url(video_id)),
        })
    }
}

/// Pick the caption track for `language`.
///
/// Exact language-code matches win over regional variants (`en` matches
/// `en-US`). Within the candidates the preferred kind is chosen first and the
/// other kind is the fallback.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str, prefer_auto: bool) -> Option<&'a CaptionTrack> {
    let wanted = language.trim().to_lowercase();

    let exact: Vec<&CaptionTrack> = tracks.iter().filter(|t| t.language_code.to_lowercase() == wanted).collect();
    let candidates = if exact.is_empty() {
        tracks
            .iter()
            .filter(|t| t.language_code.split('-').next().is_some_and(|base| base.eq_ignore_ascii_case(&wanted)))
            .collect()
    } else {
        exact
    };

    candidates
        .iter()
        .find(|t| t.is_auto_generated() == prefer_auto)
        .or_else(|| candidates.first())
        .copied()
}
