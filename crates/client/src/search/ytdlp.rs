//! Search through the `yt-dlp` executable.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use ytscribe_core::transcript::watch_url;
use ytscribe_core::{SearchQuery, SortOrder, VideoSearcher, VideoSummary};

use super::SearchError;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct Playlist {
    #[serde(default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    /// Seconds; yt-dlp emits floats for some extractors.
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    view_count: Option<u64>,
}

/// Runs `yt-dlp --flat-playlist --dump-single-json ytsearchN:query`.
#[derive(Debug, Clone)]
pub struct YtDlpSearcher {
    program: String,
    timeout: Duration,
}

impl YtDlpSearcher {
    pub fn new(program: &str) -> Self {
        Self { program: program.to_string(), timeout: SEARCH_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, target: &str) -> Result<String, SearchError> {
        let program = which::which(&self.program).map_err(|_| SearchError::NotFound(self.program.clone()))?;
        let start = Instant::now();

        let mut command = Command::new(&program);
        command
            .args(["--flat-playlist", "--dump-single-json", "--no-warnings", "--quiet", "--skip-download"])
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(program = %self.program, timeout = ?self.timeout, "yt-dlp timed out");
                return Err(SearchError::Timeout(self.timeout));
            }
        };

        tracing::debug!(
            exit_code = output.status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            stdout_len = output.stdout.len(),
            "yt-dlp completed"
        );

        if !output.status.success() {
            return Err(SearchError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VideoSearcher for YtDlpSearcher {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoSummary>, ytscribe_core::Error> {
        let stdout = self.run(&search_target(query)).await?;
        Ok(parse_playlist(&stdout, query.limit as usize)?)
    }
}

/// The yt-dlp search pseudo-URL. Date order uses `ytsearchdate`; views have no
/// dedicated prefix and fall back to relevance order.
pub fn search_target(query: &SearchQuery) -> String {
    let prefix = match query.sort {
        SortOrder::Date => "ytsearchdate",
        SortOrder::Relevance | SortOrder::Views => "ytsearch",
    };
    format!("{prefix}{}:{}", query.limit, query.query)
}

/// Parse `--dump-single-json` output, skipping entries without an id.
pub fn parse_playlist(json: &str, limit: usize) -> Result<Vec<VideoSummary>, SearchError> {
    let playlist: Playlist =
        serde_json::from_str(json).map_err(|e| SearchError::Parse(format!("invalid yt-dlp output: {e}")))?;

    Ok(playlist
        .entries
        .into_iter()
        .filter_map(|entry| {
            let video_id = entry.id.filter(|id| !id.is_empty())?;
            Some(VideoSummary {
                url: watch_url(&video_id),
                title: entry.title,
                channel: entry.uploader.or(entry.channel),
                duration_seconds: entry.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64),
                upload_date: entry.upload_date,
                view_count: entry.view_count,
                video_id,
            })
        })
        .take(limit)
        .collect())
}
