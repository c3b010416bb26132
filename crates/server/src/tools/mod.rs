//! MCP tool implementations.
#![allow(unused_imports)]

pub mod get_transcript;
pub mod search_videos;

pub use get_transcript::GetTranscriptParams;
pub use search_videos::{SearchVideosOutput, SearchVideosParams};
