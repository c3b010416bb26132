//! Transcript fetch orchestration.
//!
//! Ties the cache, the in-flight registry, the throttler and the upstream
//! fetcher together. Every path ends in a [`TranscriptResponse`]; failures are
//! reported through its `error` field, never as a protocol error.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheDb, CacheEntry, TranscriptRecord};
use crate::fetch::{FetchError, FetchRequest, FetchedTranscript, TranscriptFetcher};
use crate::inflight::{InflightRegistry, Slot};
use crate::policy::FetchPolicy;
use crate::throttle::RequestThrottler;
use crate::transcript::{Segment, Shape, VideoMetadata, join_segments};

pub const NO_TRANSCRIPT: &str = "No transcript available";
pub const TRANSCRIPT_DISABLED: &str = "No transcript available (disabled)";
pub const RATE_LIMITED: &str = "Rate limited (429): cooldown in effect";
pub const INFLIGHT_UNAVAILABLE: &str = "Internal error: inflight tracking unavailable";

/// A resolved transcript request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRequest {
    pub video_id: String,
    pub language: String,
    pub shape: Shape,
    pub prefer_auto_generated: bool,
    pub force_refresh: bool,
}

/// Coalescing granularity for upstream fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InflightKey {
    pub video_id: String,
    pub language: String,
    pub shape: Shape,
}

impl From<&TranscriptRequest> for InflightKey {
    fn from(request: &TranscriptRequest) -> Self {
        Self { video_id: request.video_id.clone(), language: request.language.clone(), shape: request.shape }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Network,
}

/// Cache status block of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStatus {
    pub hit: bool,
    pub age_seconds: Option<i64>,
    pub ttl_seconds: u64,
    pub method: String,
}

/// Uniform response envelope for `get_transcript`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TranscriptResponse {
    pub video_id: String,
    pub language: String,
    /// Null only on error.
    pub is_auto_generated: Option<bool>,
    /// Empty on error.
    pub transcript_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,
    pub cache: CacheStatus,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cache-first, deduplicated, throttled transcript fetching.
pub struct TranscriptService {
    cache: CacheDb,
    fetcher: Arc<dyn TranscriptFetcher>,
    policy: FetchPolicy,
    throttler: RequestThrottler,
    inflight: InflightRegistry<InflightKey, TranscriptResponse>,
}

impl TranscriptService {
    pub fn new(cache: CacheDb, fetcher: Arc<dyn TranscriptFetcher>, policy: FetchPolicy) -> Self {
        let throttler = RequestThrottler::new(&policy);
        Self { cache, fetcher, policy, throttler, inflight: InflightRegistry::new() }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn throttler(&self) -> &RequestThrottler {
        &self.throttler
    }

    /// Fetch a transcript, serving from cache when possible.
    ///
    /// The first caller for a key runs the upstream fetch on its own task, so it
    /// completes even if that caller goes away; concurrent callers for the same
    /// key receive the same response.
    pub async fn get_transcript(self: &Arc<Self>, request: TranscriptRequest) -> TranscriptResponse {
        let TranscriptRequest { video_id, language, shape, .. } = &request;

        if request.force_refresh {
            tracing::info!(video_id = %video_id, lang = %language, %shape, "cache bypass (force_refresh)");
        } else {
            match self.cache.get_transcript(video_id, language, *shape).await {
                Ok(Some(entry)) => {
                    let age = entry.age_seconds(Utc::now());
                    tracing::info!(video_id = %video_id, lang = %language, %shape, age_s = age, "cache hit");
                    return self.cached_response(&request, &entry);
                }
                Ok(None) => tracing::info!(video_id = %video_id, lang = %language, %shape, "cache miss"),
                Err(e) => {
                    tracing::warn!(video_id = %video_id, lang = %language, %shape, error = %e, "cache read failed")
                }
            }
        }

        match self.inflight.join_or_create(InflightKey::from(&request)) {
            Slot::Waiter(waiter) => {
                tracing::debug!(video_id = %video_id, lang = %language, %shape, "joining in-flight fetch");
                match waiter.wait().await {
                    Some(response) => response,
                    None => self.error_response(&request, INFLIGHT_UNAVAILABLE),
                }
            }
            Slot::Owner(owner) => {
                let service = Arc::clone(self);
                let owned_request = request.clone();
                let task = tokio::spawn(async move {
                    let response = service.fetch_or_reuse(&owned_request).await;
                    owner.resolve(response.clone());
                    response
                });

                match task.await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!(video_id = %video_id, lang = %language, error = %e, "fetch task failed");
                        self.error_response(&request, INFLIGHT_UNAVAILABLE)
                    }
                }
            }
        }
    }

    /// Re-check the cache under key ownership, then fetch.
    ///
    /// A previous owner may have stored and released the key between this
    /// caller's cache miss and its registration.
    async fn fetch_or_reuse(&self, request: &TranscriptRequest) -> TranscriptResponse {
        let TranscriptRequest { video_id, language, shape, .. } = request;
        if !request.force_refresh
            && let Ok(Some(entry)) = self.cache.get_transcript(video_id, language, *shape).await
        {
            tracing::debug!(video_id = %video_id, lang = %language, "stored while waiting for ownership");
            return self.cached_response(request, &entry);
        }
        self.fetch_with_policy(request).await
    }

    /// Retry loop around the upstream fetch.
    async fn fetch_with_policy(&self, request: &TranscriptRequest) -> TranscriptResponse {
        let fetch_request = FetchRequest {
            video_id: request.video_id.clone(),
            language: request.language.clone(),
            prefer_auto_generated: request.prefer_auto_generated,
            shape: request.shape,
        };
        let video_id = request.video_id.as_str();
        let lang = request.language.as_str();

        let mut attempt: u32 = 0;
        loop {
            self.throttler.wait_for_slot().await;
            tracing::info!(video_id, lang, shape = %request.shape, attempt = attempt + 1, "fetch attempt");

            match self.fetcher.fetch(&fetch_request).await {
                Ok(fetched) => {
                    self.throttler.register_success();
                    return self.store(request, fetched).await;
                }
                Err(FetchError::NotFound) => {
                    self.throttler.register_success();
                    return self.error_response(request, NO_TRANSCRIPT);
                }
                Err(FetchError::Disabled) => {
                    self.throttler.register_success();
                    return self.error_response(request, TRANSCRIPT_DISABLED);
                }
                Err(FetchError::RateLimited { retry_after, .. }) => {
                    self.throttler.register_rate_limit();
                    tracing::warn!(
                        video_id,
                        lang,
                        retry_after_s = retry_after.map(|d| d.as_secs()),
                        attempt = attempt + 1,
                        "rate limit"
                    );
                    if attempt >= self.policy.max_retries {
                        return self.error_response(request, RATE_LIMITED);
                    }
                    let delay = retry_after
                        .filter(|d| !d.is_zero())
                        .unwrap_or_else(|| self.policy.backoff(attempt));
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(FetchError::Other(message)) => {
                    self.throttler.register_success();
                    tracing::error!(video_id, lang, error = %message, "fetch error");
                    return self.error_response(request, &message);
                }
            }
        }
    }

    /// Persist a successful fetch and build the network response.
    async fn store(&self, request: &TranscriptRequest, fetched: FetchedTranscript) -> TranscriptResponse {
        let FetchedTranscript { language, is_auto_generated, segments, metadata } = fetched;
        let text = join_segments(&segments);
        let segments = (request.shape == Shape::Segments).then_some(segments);
        let language = if language.is_empty() { request.language.clone() } else { language };

        let record = TranscriptRecord {
            video_id: request.video_id.clone(),
            language: request.language.clone(),
            shape: request.shape,
            text: text.clone(),
            segments: segments.clone(),
            metadata: metadata.clone(),
            is_auto_generated: Some(is_auto_generated),
            fetch_method: self.policy.fetch_method.as_str().to_string(),
        };

        let cache = match self.cache.put_transcript(record).await {
            Ok(entry) => {
                tracing::info!(
                    video_id = %request.video_id,
                    lang = %request.language,
                    shape = %request.shape,
                    method = %entry.fetch_method,
                    "cache store"
                );
                self.entry_status(&entry)
            }
            Err(e) => {
                tracing::warn!(video_id = %request.video_id, error = %e, "failed to cache transcript");
                self.miss_status()
            }
        };

        TranscriptResponse {
            video_id: request.video_id.clone(),
            language,
            is_auto_generated: Some(is_auto_generated),
            transcript_text: text,
            segments,
            metadata,
            cache,
            source: Source::Network,
            error: None,
        }
    }

    fn cached_response(&self, request: &TranscriptRequest, entry: &CacheEntry) -> TranscriptResponse {
        let segments = match request.shape {
            Shape::Segments => entry.segments.clone(),
            Shape::Text => None,
        };

        TranscriptResponse {
            video_id: request.video_id.clone(),
            language: request.language.clone(),
            is_auto_generated: entry.is_auto_generated,
            transcript_text: entry.text.clone(),
            segments,
            metadata: entry.metadata.clone(),
            cache: self.entry_status(entry),
            source: Source::Cache,
            error: None,
        }
    }

    /// Error envelope for `request`, with a miss cache block.
    pub fn error_response(&self, request: &TranscriptRequest, error: &str) -> TranscriptResponse {
        TranscriptResponse {
            video_id: request.video_id.clone(),
            language: request.language.clone(),
            is_auto_generated: None,
            transcript_text: String::new(),
            segments: None,
            metadata: None,
            cache: self.miss_status(),
            source: Source::Network,
            error: Some(error.to_string()),
        }
    }

    fn entry_status(&self, entry: &CacheEntry) -> CacheStatus {
        CacheStatus {
            hit: true,
            age_seconds: Some(entry.age_seconds(Utc::now())),
            ttl_seconds: self.policy.ttl_seconds,
            method: entry.fetch_method.clone(),
        }
    }

    fn miss_status(&self) -> CacheStatus {
        CacheStatus {
            hit: false,
            age_seconds: None,
            ttl_seconds: self.policy.ttl_seconds,
            method: self.policy.fetch_method.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::content_hash;
    use crate::policy::FetchMethod;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Outcome = Result<FetchedTranscript, FetchError>;

    /// Replays scripted outcomes, then repeats the fallback.
    struct ScriptedFetcher {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Outcome>>,
        fallback: Outcome,
        delay: Duration,
    }

    impl ScriptedFetcher {
        fn new(fallback: Outcome) -> Self {
            Self { calls: AtomicUsize::new(0), script: Mutex::new(VecDeque::new()), fallback, delay: Duration::ZERO }
        }

        fn then(self, outcome: Outcome) -> Self {
            self.script.lock().unwrap().push_back(outcome);
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranscriptFetcher for ScriptedFetcher {
        async fn fetch(&self, _request: &FetchRequest) -> Result<FetchedTranscript, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl TranscriptFetcher for PanickingFetcher {
        async fn fetch(&self, _request: &FetchRequest) -> Result<FetchedTranscript, FetchError> {
            panic!("upstream client bug");
        }
    }

    fn transcript() -> FetchedTranscript {
        FetchedTranscript {
            language: "en".into(),
            is_auto_generated: true,
            segments: vec![
                Segment { start: 0.0, duration: 2.0, text: "never gonna ".into() },
                Segment { start: 2.0, duration: 2.5, text: "give you up".into() },
            ],
            metadata: Some(VideoMetadata {
                video_id: "dQw4w9WgXcQ".into(),
                title: Some("Never Gonna Give You Up".into()),
                ..Default::default()
            }),
        }
    }

    fn request(shape: Shape) -> TranscriptRequest {
        TranscriptRequest {
            video_id: "dQw4w9WgXcQ".into(),
            language: "en".into(),
            shape,
            prefer_auto_generated: true,
            force_refresh: false,
        }
    }

    fn rate_limited() -> FetchError {
        FetchError::RateLimited { message: "HTTP 429".into(), retry_after: None }
    }

    async fn service(fetcher: Arc<ScriptedFetcher>, method: FetchMethod) -> Arc<TranscriptService> {
        let cache = CacheDb::open_in_memory().await.unwrap();
        Arc::new(TranscriptService::new(cache, fetcher, FetchPolicy::for_method(method)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_then_cache() {
        let fetcher = Arc::new(ScriptedFetcher::new(Ok(transcript())));
        let svc = service(Arc::clone(&fetcher), FetchMethod::Library).await;

        let first = svc.get_transcript(request(Shape::Text)).await;
        assert_eq!(first.source, Source::Network);
        assert_eq!(first.transcript_text, "never gonna give you up");
        assert_eq!(first.is_auto_generated, Some(true));
        assert!(first.segments.is_none());
        assert!(first.error.is_none());
        assert!(first.cache.hit);
        assert_eq!(first.cache.method, "LIBRARY");

        let second = svc.get_transcript(request(Shape::Text)).await;
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.transcript_text, first.transcript_text);
        assert_eq!(second.metadata, first.metadata);
        assert!(second.cache.age_seconds.is_some());
        assert_eq!(fetcher.calls(), 1);

        let entry = svc
            .cache
            .get_transcript("dQw4w9WgXcQ", "en", Shape::Text)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.content_hash, content_hash("never gonna give you up"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_segments_only_for_segments_shape() {
        let fetcher = Arc::new(ScriptedFetcher::new(Ok(transcript())));
        let svc = service(Arc::clone(&fetcher), FetchMethod::Api).await;

        let response = svc.get_transcript(request(Shape::Segments)).await;
        assert_eq!(response.segments.as_ref().map(Vec::len), Some(2));

        let cached = svc.get_transcript(request(Shape::Segments)).await;
        assert_eq!(cached.source, Source::Cache);
        assert_eq!(cached.segments, response.segments);

        let text = svc.get_transcript(request(Shape::Text)).await;
        assert_eq!(text.source, Source::Network);
        assert!(text.segments.is_none());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_matches_policy() {
        for method in [FetchMethod::Api, FetchMethod::Library, FetchMethod::Scrape] {
            let fetcher = Arc::new(ScriptedFetcher::new(Ok(transcript())));
            let svc = service(fetcher, method).await;
            let expected = FetchPolicy::for_method(method).ttl_seconds;

            let network = svc.get_transcript(request(Shape::Text)).await;
            let cached = svc.get_transcript(request(Shape::Text)).await;
            assert_eq!(network.cache.ttl_seconds, expected);
            assert_eq!(cached.cache.ttl_seconds, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_bypasses_cache() {
        let fetcher = Arc::new(ScriptedFetcher::new(Ok(transcript())));
        let svc = service(Arc::clone(&fetcher), FetchMethod::Api).await;

        svc.get_transcript(request(Shape::Text)).await;
        let refreshed = svc
            .get_transcript(TranscriptRequest { force_refresh: true, ..request(Shape::Text) })
            .await;

        assert_eq!(refreshed.source, Source::Network);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_envelope() {
        let fetcher = Arc::new(ScriptedFetcher::new(Err(FetchError::NotFound)));
        let svc = service(Arc::clone(&fetcher), FetchMethod::Library).await;

        let response = svc.get_transcript(request(Shape::Text)).await;
        assert_eq!(response.transcript_text, "");
        assert_eq!(response.error.as_deref(), Some(NO_TRANSCRIPT));
        assert_eq!(response.is_auto_generated, None);
        assert!(!response.cache.hit);
        assert_eq!(response.cache.age_seconds, None);
        assert_eq!(fetcher.calls(), 1);

        let state = svc.throttler().snapshot();
        assert!(state.cooldown_until.is_none());
        assert_eq!(state.consecutive_rate_limit_count, 0);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["is_auto_generated"].is_null());
        assert_eq!(json["source"], "network");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_envelope() {
        let fetcher = Arc::new(ScriptedFetcher::new(Err(FetchError::Disabled)));
        let svc = service(fetcher, FetchMethod::Scrape).await;

        let response = svc.get_transcript(request(Shape::Text)).await;
        assert_eq!(response.error.as_deref(), Some(TRANSCRIPT_DISABLED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_retries() {
        let fetcher = Arc::new(ScriptedFetcher::new(Err(rate_limited())));
        let svc = service(Arc::clone(&fetcher), FetchMethod::Library).await;
        let max_retries = svc.policy().max_retries as usize;

        let response = svc.get_transcript(request(Shape::Text)).await;

        assert_eq!(fetcher.calls(), max_retries + 1);
        assert!(response.error.as_deref().unwrap().contains("Rate limited"));
        assert_eq!(response.transcript_text, "");
        assert!(svc.throttler().snapshot().cooldown_until.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(Ok(transcript())).then(Err(FetchError::RateLimited {
                message: "429".into(),
                retry_after: Some(Duration::from_secs(7)),
            })),
        );
        let svc = service(Arc::clone(&fetcher), FetchMethod::Api).await;

        let start = tokio::time::Instant::now();
        let response = svc.get_transcript(request(Shape::Text)).await;

        assert!(response.error.is_none());
        assert_eq!(response.source, Source::Network);
        assert_eq!(fetcher.calls(), 2);
        assert!(start.elapsed() >= Duration::from_secs(7));

        let state = svc.throttler().snapshot();
        assert_eq!(state.consecutive_rate_limit_count, 0);
        assert!(state.cooldown_until.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_error_not_retried() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(Ok(transcript())).then(Err(FetchError::Other("video unavailable".into()))),
        );
        let svc = service(Arc::clone(&fetcher), FetchMethod::Api).await;

        let response = svc.get_transcript(request(Shape::Text)).await;

        assert_eq!(response.error.as_deref(), Some("video unavailable"));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(svc.throttler().snapshot().consecutive_rate_limit_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_fetch() {
        let fetcher = Arc::new(ScriptedFetcher::new(Ok(transcript())).with_delay(Duration::from_secs(1)));
        let svc = service(Arc::clone(&fetcher), FetchMethod::Library).await;

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move {
                    svc.get_transcript(TranscriptRequest { force_refresh: true, ..request(Shape::Segments) })
                        .await
                })
            })
            .collect();

        let mut bodies = Vec::new();
        for handle in handles {
            bodies.push(serde_json::to_string(&handle.await.unwrap()).unwrap());
        }

        assert_eq!(fetcher.calls(), 1);
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
        assert!(svc.inflight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_errors_are_shared() {
        let fetcher = Arc::new(ScriptedFetcher::new(Err(FetchError::NotFound)).with_delay(Duration::from_secs(1)));
        let svc = service(Arc::clone(&fetcher), FetchMethod::Library).await;

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move {
                    svc.get_transcript(TranscriptRequest { force_refresh: true, ..request(Shape::Text) })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().error.as_deref(), Some(NO_TRANSCRIPT));
        }
        assert_eq!(fetcher.calls(), 1);
        assert!(svc.inflight.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_simultaneous_pairs_fetch_once() {
        let policy =
            FetchPolicy { min_interval_seconds: 0.0, jitter_seconds: 0.0, ..FetchPolicy::for_method(FetchMethod::Api) };

        for _ in 0..200 {
            let fetcher = Arc::new(ScriptedFetcher::new(Ok(transcript())));
            let cache = CacheDb::open_in_memory().await.unwrap();
            let svc = Arc::new(TranscriptService::new(cache, fetcher.clone(), policy.clone()));

            let first = tokio::spawn({
                let svc = Arc::clone(&svc);
                async move { svc.get_transcript(request(Shape::Text)).await }
            });
            let second = tokio::spawn({
                let svc = Arc::clone(&svc);
                async move { svc.get_transcript(request(Shape::Text)).await }
            });

            let (first, second) = (first.await.unwrap(), second.await.unwrap());
            assert_eq!(first.transcript_text, second.transcript_text);
            assert!(second.error.is_none());
            assert_eq!(fetcher.calls(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_owner_reuses_entry_stored_before_registration() {
        let fetcher = Arc::new(ScriptedFetcher::new(Ok(transcript())));
        let svc = service(Arc::clone(&fetcher), FetchMethod::Library).await;

        svc.get_transcript(request(Shape::Text)).await;
        let response = svc.fetch_or_reuse(&request(Shape::Text)).await;

        assert_eq!(response.source, Source::Cache);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetch_releases_key() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let svc = Arc::new(TranscriptService::new(
            cache,
            Arc::new(PanickingFetcher),
            FetchPolicy::for_method(FetchMethod::Api),
        ));

        let response = svc.get_transcript(request(Shape::Text)).await;
        assert_eq!(response.error.as_deref(), Some(INFLIGHT_UNAVAILABLE));
        assert!(svc.inflight.is_empty());
    }
}
