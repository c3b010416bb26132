//! YouTube Data API v3 search.
//!
//! `search.list` returns ids and snippets only, so results are enriched with a
//! single `videos.list` call for durations and view counts. A failed
//! enrichment is logged and the bare results are returned.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use ytscribe_core::transcript::watch_url;
use ytscribe_core::{AppConfig, SearchQuery, SortOrder, VideoSearcher, VideoSummary};

use super::SearchError;
use crate::date::compact_date;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

static ISO8601_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("valid duration regex")
});

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    #[serde(default)]
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel_title: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    content_details: Option<ContentDetails>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    /// Decimal string.
    #[serde(default)]
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Data API search client.
#[derive(Debug, Clone)]
pub struct DataApiSearcher {
    http: Client,
    api_key: String,
    base_url: String,
}

impl DataApiSearcher {
    pub fn new(api_key: &str, config: &AppConfig) -> Result<Self, SearchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .use_rustls_tls()
            .gzip(true)
            .build()?;

        Ok(Self { http, api_key: api_key.to_string(), base_url: DEFAULT_BASE_URL.to_string() })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, SearchError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(SearchError::Api { status: status.as_u16(), message });
        }

        serde_json::from_slice(&bytes).map_err(|e| SearchError::Parse(format!("invalid {endpoint} response: {e}")))
    }

    async fn search_list(&self, query: &SearchQuery) -> Result<Vec<VideoSummary>, SearchError> {
        let max_results = query.limit.to_string();
        let params = [
            ("part", "snippet"),
            ("type", "video"),
            ("q", query.query.as_str()),
            ("maxResults", max_results.as_str()),
            ("order", api_order(query.sort)),
        ];

        let response: SearchListResponse = self.get("search", &params).await?;
        Ok(summaries_from_search(response, query.limit as usize))
    }

    async fn enrich(&self, items: &mut [VideoSummary]) -> Result<(), SearchError> {
        if items.is_empty() {
            return Ok(());
        }

        let ids = items.iter().map(|i| i.video_id.as_str()).collect::<Vec<_>>().join(",");
        let response: VideoListResponse =
            self.get("videos", &[("part", "contentDetails,statistics"), ("id", ids.as_str())]).await?;
        apply_details(items, response);
        Ok(())
    }
}

#[async_trait]
impl VideoSearcher for DataApiSearcher {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoSummary>, ytscribe_core::Error> {
        let mut items = self.search_list(query).await?;

        if let Err(e) = self.enrich(&mut items).await {
            tracing::warn!(error = %e, "failed to enrich search results");
        }

        Ok(items)
    }
}

fn api_order(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Relevance => "relevance",
        SortOrder::Views => "viewCount",
        SortOrder::Date => "date",
    }
}

fn summaries_from_search(response: SearchListResponse, limit: usize) -> Vec<VideoSummary> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id.filter(|id| !id.is_empty())?;
            let snippet = item.snippet;
            Some(VideoSummary {
                url: watch_url(&video_id),
                title: snippet.as_ref().and_then(|s| s.title.clone()),
                channel: snippet.as_ref().and_then(|s| s.channel_title.clone()),
                upload_date: snippet.as_ref().and_then(|s| s.published_at.as_deref()).and_then(compact_date),
                duration_seconds: None,
                view_count: None,
                video_id,
            })
        })
        .take(limit)
        .collect()
}

fn apply_details(items: &mut [VideoSummary], response: VideoListResponse) {
    let details: HashMap<String, VideoItem> = response.items.into_iter().map(|v| (v.id.clone(), v)).collect();

    for item in items.iter_mut() {
        let Some(video) = details.get(&item.video_id) else {
            continue;
        };
        item.duration_seconds = video
            .content_details
            .as_ref()
            .and_then(|c| c.duration.as_deref())
            .and_then(parse_iso8601_duration);
        item.view_count = video
            .statistics
            .as_ref()
            .and_then(|s| s.view_count.as_deref())
            .and_then(|v| v.parse().ok());
    }
}

/// Parse an ISO-8601 duration such as `PT1H2M3S` into seconds.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let caps = ISO8601_DURATION.captures(value.trim())?;
    let part = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u64>().ok()).unwrap_or(0);
    Some(part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT3M33S"), Some(213));
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("P1DT1H"), Some(90_000));
        assert_eq!(parse_iso8601_duration("P0D"), Some(0));
        assert_eq!(parse_iso8601_duration("3:33"), None);
    }

    #[test]
    fn test_api_order() {
        assert_eq!(api_order(SortOrder::Relevance), "relevance");
        assert_eq!(api_order(SortOrder::Views), "viewCount");
        assert_eq!(api_order(SortOrder::Date), "date");
    }

    #[test]
    fn test_search_and_enrich() {
        let search: SearchListResponse = serde_json::from_str(
            r#"{"items": [
                {"id": {"kind": "youtube#video", "videoId": "aaaaaaaaaaa"},
                 "snippet": {"title": "First", "channelTitle": "Chan", "publishedAt": "2024-03-01T10:00:00Z"}},
                {"id": {"kind": "youtube#channel", "channelId": "UC123"}},
                {"id": {"videoId": "bbbbbbbbbbb"}}
            ]}"#,
        )
        .unwrap();

        let mut items = summaries_from_search(search, 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].upload_date.as_deref(), Some("20240301"));
        assert_eq!(items[0].channel.as_deref(), Some("Chan"));

        let videos: VideoListResponse = serde_json::from_str(
            r#"{"items": [
                {"id": "aaaaaaaaaaa", "contentDetails": {"duration": "PT10M"}, "statistics": {"viewCount": "42"}}
            ]}"#,
        )
        .unwrap();
        apply_details(&mut items, videos);

        assert_eq!(items[0].duration_seconds, Some(600));
        assert_eq!(items[0].view_count, Some(42));
        assert_eq!(items[1].duration_seconds, None);
    }

    #[test]
    fn test_api_error_body() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"error": {"code": 403, "message": "quota exceeded"}}"#).unwrap();
        assert_eq!(body.error.message, "quota exceeded");
    }
}
