//! search_videos tool implementation.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ytscribe_core::search::{clamp_limit, effective_sort};
use ytscribe_core::{Error, SearchQuery, SortOrder, VideoSearcher, VideoSummary};

/// Input parameters for search_videos tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchVideosParams {
    /// Search query (required).
    pub query: String,

    /// Number of results (clamped to 1-10, default 5).
    #[serde(default = "default_limit")]
    pub limit: i64,

    /// Ordering: relevance (default), views or date. Unknown values mean relevance.
    #[serde(default = "default_sort")]
    pub sort: String,
}

fn default_limit() -> i64 {
    5
}

fn default_sort() -> String {
    "relevance".into()
}

/// Output structure for search_videos tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchVideosOutput {
    pub query: String,
    pub limit: u32,
    pub sort_requested: SortOrder,
    /// `relevance` when `views` was requested but no view counts came back.
    pub sort_effective: SortOrder,
    pub items: Vec<VideoSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn failed_output(query: SearchQuery, error: String) -> SearchVideosOutput {
    SearchVideosOutput {
        query: query.query,
        limit: query.limit,
        sort_requested: query.sort,
        sort_effective: query.sort,
        items: Vec::new(),
        error: Some(error),
    }
}

/// Implementation of the search_videos tool.
pub async fn search_videos_impl(
    searcher: &dyn VideoSearcher, params: SearchVideosParams,
) -> Result<CallToolResult, McpError> {
    let query = SearchQuery {
        query: params.query.clone(),
        limit: clamp_limit(params.limit),
        sort: SortOrder::parse_lenient(&params.sort),
    };

    let output = if query.query.trim().is_empty() {
        failed_output(query, "query cannot be empty".into())
    } else {
        match searcher.search(&query).await {
            Ok(mut items) => {
                items.truncate(query.limit as usize);
                tracing::info!(query = %query.query, results = items.len(), "search completed");
                SearchVideosOutput {
                    sort_effective: effective_sort(query.sort, &items),
                    query: query.query,
                    limit: query.limit,
                    sort_requested: query.sort,
                    items,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(query = %query.query, error = %e, "search_videos failed");
                failed_output(query, e.to_string())
            }
        }
    };

    let json = serde_json::to_string_pretty(&output).map_err(Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
