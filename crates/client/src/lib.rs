//! Upstream clients for the YouTube transcript server.
//!
//! This crate provides the YouTube transcript fetcher, the search backends and
//! the capability probes that pick between them.

pub mod capability;
pub mod date;
pub mod search;
pub mod youtube;

pub use capability::{detect, probe};
pub use search::{DataApiSearcher, SearchError, YtDlpSearcher, build_searcher};
pub use youtube::{PlayerSource, YouTubeClient, YouTubeConfig, YouTubeError};
