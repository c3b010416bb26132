//! Timed-text (`json3`) download format.

use serde::Deserialize;
use url::Url;
use ytscribe_core::Segment;

use super::error::YouTubeError;

const YOUTUBE_ORIGIN: &str = "https://www.youtube.com";

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    /// Absent on window and style events.
    #[serde(default)]
    segs: Option<Vec<Seg>>,
}

#[derive(Debug, Deserialize)]
struct Seg {
    #[serde(default)]
    utf8: String,
}

/// Caption download URL for a track's `baseUrl`, forcing the `json3` format.
pub fn json3_url(base_url: &str) -> Result<Url, YouTubeError> {
    let origin = Url::parse(YOUTUBE_ORIGIN).map_err(|e| YouTubeError::Parse(e.to_string()))?;
    let mut url = origin
        .join(base_url)
        .map_err(|e| YouTubeError::Parse(format!("invalid caption url: {e}")))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut().clear().extend_pairs(kept).append_pair("fmt", "json3");

    Ok(url)
}

/// Parse a `json3` body into segments, skipping events without text.
pub fn parse_json3(body: &str) -> Result<Vec<Segment>, YouTubeError> {
    if body.trim().is_empty() {
        return Err(YouTubeError::Parse("empty timed text response".into()));
    }

    let timed: TimedText =
        serde_json::from_str(body).map_err(|e| YouTubeError::Parse(format!("invalid timed text: {e}")))?;

    let segments = timed
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs?.into_iter().map(|s| s.utf8).collect::<String>().replace('\n', " ");
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Segment {
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
                text: text.to_string(),
            })
        })
        .collect();

    Ok(segments)
}
