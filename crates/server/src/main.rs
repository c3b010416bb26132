//! mcp-youtube-transcriber server entry point.
//!
//! Detects fetch capability once, derives the rate-limit policy, opens the
//! transcript cache and serves the MCP tools on stdio. Logging goes to stderr
//! to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use ytscribe_client::{YouTubeClient, YouTubeConfig, build_searcher, detect};
use ytscribe_core::{AppConfig, CacheDb, FetchPolicy, TranscriptService};

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;

    let classification = detect(&config);
    let method = classification.fetch_method;
    let policy = FetchPolicy::for_classification(&classification);
    tracing::info!(
        method = %method,
        ttl_s = policy.ttl_seconds,
        min_interval_s = policy.min_interval_seconds,
        max_retries = policy.max_retries,
        "fetch policy"
    );

    let cache = CacheDb::open(&config.cache_path)
        .await
        .with_context(|| format!("opening cache at {}", config.cache_path.display()))?;
    tracing::info!(path = %config.cache_path.display(), "transcript cache ready");

    let fetcher = YouTubeClient::new(YouTubeConfig::from_app_config(&config, method))?;
    let searcher = build_searcher(&config, method)?;
    let service = Arc::new(TranscriptService::new(cache, Arc::new(fetcher), policy));

    tracing::info!("Starting mcp-youtube-transcriber on stdio transport");

    let handler = handler::TranscriberServer::new(service, searcher);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
