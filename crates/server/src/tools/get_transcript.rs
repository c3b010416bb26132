//! get_transcript tool implementation.
//!
//! Resolves the video id and delegates to the transcript service. Fetch
//! failures come back inside the response envelope, not as protocol errors.

use std::sync::Arc;

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ytscribe_core::{Error, Shape, TranscriptRequest, TranscriptService, extract_video_id};

/// Input parameters for get_transcript tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetTranscriptParams {
    /// YouTube URL (watch, youtu.be, shorts) or bare 11-character video id.
    pub url_or_id: String,

    /// Transcript language code (default "en").
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Prefer auto-generated captions over manual ones (default true).
    #[serde(default = "default_true")]
    pub prefer_auto: bool,

    /// Include timestamped segments (default false).
    #[serde(default)]
    pub include_timestamps: bool,

    /// Bypass the cache (default false).
    #[serde(default)]
    pub force_refresh: bool,
}

fn default_lang() -> String {
    "en".into()
}

fn default_true() -> bool {
    true
}

/// Implementation of the get_transcript tool.
///
/// A blank `url_or_id` yields an error envelope without touching the cache.
pub async fn get_transcript_impl(
    service: &Arc<TranscriptService>, params: GetTranscriptParams,
) -> Result<CallToolResult, McpError> {
    let video_id = extract_video_id(&params.url_or_id);
    let language = match params.lang.trim() {
        "" => default_lang(),
        lang => lang.to_string(),
    };

    let request = TranscriptRequest {
        video_id,
        language,
        shape: Shape::from_timestamps(params.include_timestamps),
        prefer_auto_generated: params.prefer_auto,
        force_refresh: params.force_refresh,
    };

    let response = if request.video_id.is_empty() {
        tracing::warn!("get_transcript called without a video id");
        service.error_response(&request, "url_or_id cannot be empty")
    } else {
        service.get_transcript(request).await
    };
    let json = serde_json::to_string_pretty(&response).map_err(Error::from)?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
