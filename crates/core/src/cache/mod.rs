//! SQLite-backed transcript cache.
//!
//! A persistent store keyed by `(video_id, language, shape)` using SQLite with
//! async access via tokio-rusqlite. It provides:
//!
//! - SHA-256 content hashes recomputed on every write
//! - Versioned migrations plus additive, null-safe optional columns
//! - WAL mode for concurrent access
//! - A `fetched_at` index for inspection and eviction tooling

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod transcripts;

pub use crate::Error;

pub use connection::CacheDb;
pub use transcripts::{CacheEntry, TranscriptRecord};
