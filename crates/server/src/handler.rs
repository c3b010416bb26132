//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::get_transcript::{GetTranscriptParams, get_transcript_impl};
use crate::tools::search_videos::{SearchVideosParams, search_videos_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use ytscribe_core::{TranscriptService, VideoSearcher};

/// The main MCP server handler for the transcript server.
#[derive(Clone)]
pub struct TranscriberServer {
    tool_router: ToolRouter<Self>,
    service: Arc<TranscriptService>,
    searcher: Arc<dyn VideoSearcher>,
}

#[tool_router]
impl TranscriberServer {
    /// Create a new server handler.
    pub fn new(service: Arc<TranscriptService>, searcher: Arc<dyn VideoSearcher>) -> Self {
        Self { tool_router: Self::tool_router(), service, searcher }
    }

    /// Search YouTube videos by query.
    #[tool(
        description = "Search YouTube videos by query. Returns up to `limit` (1-10) results with id, title, channel, duration, upload date, URL and view count. `sort` is relevance, views or date."
    )]
    async fn search_videos(&self, params: Parameters<SearchVideosParams>) -> Result<CallToolResult, McpError> {
        search_videos_impl(self.searcher.as_ref(), params.0).await
    }

    /// Fetch a transcript, cache first.
    #[tool(
        description = "Fetch the transcript of a YouTube video by URL or id. Served from a local cache when possible; set include_timestamps for timed segments and force_refresh to bypass the cache. Failures are reported in the `error` field."
    )]
    async fn get_transcript(&self, params: Parameters<GetTranscriptParams>) -> Result<CallToolResult, McpError> {
        get_transcript_impl(&self.service, params.0).await
    }
}

impl ServerHandler for TranscriberServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-youtube-transcriber".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Use search_videos to find videos and get_transcript to read them. Transcripts are cached; repeated requests are cheap.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
