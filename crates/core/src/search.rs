//! Video search seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Smallest and largest accepted result counts.
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 10;

/// Requested result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Relevance,
    Views,
    Date,
}

impl SortOrder {
    /// Parse leniently; unknown or empty values fall back to relevance.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "views" => SortOrder::Views,
            "date" => SortOrder::Date,
            _ => SortOrder::Relevance,
        }
    }
}

/// Clamp a requested limit into `[MIN_LIMIT, MAX_LIMIT]`.
pub fn clamp_limit(limit: i64) -> u32 {
    limit.clamp(MIN_LIMIT as i64, MAX_LIMIT as i64) as u32
}

/// A search request after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub limit: u32,
    pub sort: SortOrder,
}

/// Basic metadata for one search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub duration_seconds: Option<u64>,
    /// Upload date as `YYYYMMDD`.
    pub upload_date: Option<String>,
    pub url: String,
    pub view_count: Option<u64>,
}

/// External video search capability.
#[async_trait]
pub trait VideoSearcher: Send + Sync {
    /// Return up to `query.limit` results.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoSummary>, Error>;
}

/// The ordering actually achieved for a result set.
///
/// A views ordering without any view counts is reported as relevance.
pub fn effective_sort(requested: SortOrder, items: &[VideoSummary]) -> SortOrder {
    if requested == SortOrder::Views && !items.iter().any(|i| i.view_count.is_some_and(|v| v > 0)) {
        SortOrder::Relevance
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient() {
        assert_eq!(SortOrder::parse_lenient("views"), SortOrder::Views);
        assert_eq!(SortOrder::parse_lenient("DATE"), SortOrder::Date);
        assert_eq!(SortOrder::parse_lenient("relevance"), SortOrder::Relevance);
        assert_eq!(SortOrder::parse_lenient("rating"), SortOrder::Relevance);
        assert_eq!(SortOrder::parse_lenient(""), SortOrder::Relevance);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(-4), 1);
        assert_eq!(clamp_limit(5), 5);
        assert_eq!(clamp_limit(50), 10);
    }

    #[test]
    fn test_effective_sort_views_without_counts() {
        let items = vec![VideoSummary { video_id: "a".into(), ..Default::default() }];
        assert_eq!(effective_sort(SortOrder::Views, &items), SortOrder::Relevance);
        assert_eq!(effective_sort(SortOrder::Views, &[]), SortOrder::Relevance);
    }

    #[test]
    fn test_effective_sort_views_with_counts() {
        let items = vec![VideoSummary { video_id: "a".into(), view_count: Some(10), ..Default::default() }];
        assert_eq!(effective_sort(SortOrder::Views, &items), SortOrder::Views);
        assert_eq!(effective_sort(SortOrder::Date, &[]), SortOrder::Date);
    }
}
