//! Fetch capability classification and the rate-limiting policy derived from it.
//!
//! Three fixed profiles exist, one per [`FetchMethod`]. The authenticated Data API
//! tolerates the most traffic; unauthenticated scraping the least.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Effectively unbounded TTL used for scraped transcripts (about 31.7 years).
pub const SCRAPE_TTL_SECONDS: u64 = 1_000_000_000;

const DAY: u64 = 24 * 60 * 60;

/// How transcripts are obtained, highest privilege first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchMethod {
    /// Authenticated structured-data API.
    Api,
    /// Unauthenticated transcript-specific client.
    Library,
    /// Generic page scraping.
    Scrape,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMethod::Api => "API",
            FetchMethod::Library => "LIBRARY",
            FetchMethod::Scrape => "SCRAPE",
        }
    }
}

impl std::fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Results of the individual capability probes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Probes {
    /// A YouTube Data API key is configured.
    pub data_api: bool,
    /// The InnerTube transcript client is compiled in.
    pub transcript_api: bool,
    /// A `yt-dlp` binary is on the path.
    pub ytdlp: bool,
}

/// Detected fetch capability. Computed once per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchClassification {
    pub fetch_method: FetchMethod,
    pub capabilities_detected: BTreeSet<String>,
    pub auth_required: bool,
}

impl FetchClassification {
    /// Compose probe results by priority: API, then LIBRARY, then SCRAPE.
    pub fn from_probes(probes: Probes) -> Self {
        let mut capabilities_detected = BTreeSet::new();
        if probes.data_api {
            capabilities_detected.insert("youtube_data_api".to_string());
        }
        if probes.transcript_api {
            capabilities_detected.insert("transcript_api".to_string());
        }
        if probes.ytdlp {
            capabilities_detected.insert("yt-dlp".to_string());
        }

        let fetch_method = if probes.data_api {
            FetchMethod::Api
        } else if probes.transcript_api {
            FetchMethod::Library
        } else {
            FetchMethod::Scrape
        };

        Self { fetch_method, capabilities_detected, auth_required: fetch_method == FetchMethod::Api }
    }
}

/// Rate-limiting policy for a fetch method. Immutable once derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchPolicy {
    pub fetch_method: FetchMethod,
    pub auth_required: bool,
    pub ttl_seconds: u64,
    pub min_interval_seconds: f64,
    pub jitter_seconds: f64,
    pub max_retries: u32,
    pub backoff_base_seconds: f64,
    pub backoff_max_seconds: f64,
    pub cooldown_seconds: u64,
    /// Documentary only; nothing enforces it.
    pub safe_max_per_hour: u32,
}

impl FetchPolicy {
    /// Derive the fixed profile for a classification.
    pub fn for_classification(classification: &FetchClassification) -> Self {
        Self::for_method(classification.fetch_method)
    }

    pub fn for_method(method: FetchMethod) -> Self {
        match method {
            FetchMethod::Api => Self {
                fetch_method: method,
                auth_required: true,
                ttl_seconds: 14 * DAY,
                min_interval_seconds: 1.0,
                jitter_seconds: 0.5,
                max_retries: 2,
                backoff_base_seconds: 2.0,
                backoff_max_seconds: 30.0,
                cooldown_seconds: 5 * 60,
                safe_max_per_hour: 50,
            },
            FetchMethod::Library => Self {
                fetch_method: method,
                auth_required: false,
                ttl_seconds: 60 * DAY,
                min_interval_seconds: 8.0,
                jitter_seconds: 2.0,
                max_retries: 3,
                backoff_base_seconds: 2.0,
                backoff_max_seconds: 60.0,
                cooldown_seconds: 15 * 60,
                safe_max_per_hour: 5,
            },
            FetchMethod::Scrape => Self {
                fetch_method: method,
                auth_required: false,
                ttl_seconds: SCRAPE_TTL_SECONDS,
                min_interval_seconds: 12.0,
                jitter_seconds: 3.0,
                max_retries: 1,
                backoff_base_seconds: 2.0,
                backoff_max_seconds: 20.0,
                cooldown_seconds: 30 * 60,
                safe_max_per_hour: 3,
            },
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_interval_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// Exponential backoff for a zero-based attempt: `min(max, base * 2^attempt)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.min(30) as i32);
        Duration::from_secs_f64((self.backoff_base_seconds * exp).min(self.backoff_max_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_api_wins() {
        let c = FetchClassification::from_probes(Probes { data_api: true, transcript_api: true, ytdlp: true });
        assert_eq!(c.fetch_method, FetchMethod::Api);
        assert!(c.auth_required);
        assert_eq!(c.capabilities_detected.len(), 3);
    }

    #[test]
    fn test_library_without_api() {
        let c = FetchClassification::from_probes(Probes { data_api: false, transcript_api: true, ytdlp: true });
        assert_eq!(c.fetch_method, FetchMethod::Library);
        assert!(!c.auth_required);
        assert!(c.capabilities_detected.contains("yt-dlp"));
    }

    #[test]
    fn test_scrape_when_nothing_detected() {
        let c = FetchClassification::from_probes(Probes::default());
        assert_eq!(c.fetch_method, FetchMethod::Scrape);
        assert!(!c.auth_required);
        assert!(c.capabilities_detected.is_empty());
    }

    #[test]
    fn test_ytdlp_does_not_change_method() {
        let c = FetchClassification::from_probes(Probes { ytdlp: true, ..Default::default() });
        assert_eq!(c.fetch_method, FetchMethod::Scrape);
    }

    #[test]
    fn test_profiles() {
        let api = FetchPolicy::for_method(FetchMethod::Api);
        assert_eq!(api.ttl_seconds, 14 * 24 * 3600);
        assert_eq!(api.max_retries, 2);
        assert_eq!(api.cooldown_seconds, 300);
        assert_eq!(api.safe_max_per_hour, 50);

        let lib = FetchPolicy::for_method(FetchMethod::Library);
        assert_eq!(lib.ttl_seconds, 60 * 24 * 3600);
        assert_eq!(lib.min_interval_seconds, 8.0);
        assert_eq!(lib.jitter_seconds, 2.0);
        assert_eq!(lib.max_retries, 3);
        assert_eq!(lib.cooldown_seconds, 900);

        let scrape = FetchPolicy::for_method(FetchMethod::Scrape);
        assert_eq!(scrape.ttl_seconds, SCRAPE_TTL_SECONDS);
        assert_eq!(scrape.min_interval_seconds, 12.0);
        assert_eq!(scrape.max_retries, 1);
        assert_eq!(scrape.backoff_max_seconds, 20.0);
        assert_eq!(scrape.cooldown_seconds, 1800);
        assert_eq!(scrape.safe_max_per_hour, 3);
    }

    #[test]
    fn test_auth_follows_method() {
        let c = FetchClassification::from_probes(Probes { data_api: true, ..Default::default() });
        assert!(FetchPolicy::for_classification(&c).auth_required);
        let c = FetchClassification::from_probes(Probes { transcript_api: true, ..Default::default() });
        assert!(!FetchPolicy::for_classification(&c).auth_required);
    }

    #[test]
    fn test_backoff_caps() {
        let policy = FetchPolicy::for_method(FetchMethod::Api);
        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(16));
        assert_eq!(policy.backoff(4), Duration::from_secs(30));
        assert_eq!(policy.backoff(100), Duration::from_secs(30));
    }
}
