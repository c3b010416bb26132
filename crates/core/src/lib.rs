//! Core types and shared functionality for the YouTube transcript server.
//!
//! This crate provides:
//! - Fetch policy derivation from detected capabilities
//! - SQLite transcript cache
//! - Request throttling and in-flight deduplication
//! - The transcript service that orchestrates them
//! - Configuration and unified error types

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod inflight;
pub mod policy;
pub mod search;
pub mod service;
pub mod throttle;
pub mod transcript;
pub mod video_id;

pub use cache::CacheDb;
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use fetch::{FetchError, FetchRequest, FetchedTranscript, TranscriptFetcher};
pub use policy::{FetchClassification, FetchMethod, FetchPolicy, Probes};
pub use search::{SearchQuery, SortOrder, VideoSearcher, VideoSummary};
pub use service::{TranscriptRequest, TranscriptResponse, TranscriptService};
pub use transcript::{Segment, Shape, VideoMetadata};
pub use video_id::extract_video_id;
