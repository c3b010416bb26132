//! Transcript cache operations.
//!
//! Entries are keyed by `(video_id, language, shape)` and replaced wholesale on
//! every write. The content hash is always recomputed from the stored text.

use super::connection::CacheDb;
use super::hash::content_hash;
use crate::Error;
use crate::transcript::{Segment, Shape, VideoMetadata};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub video_id: String,
    pub language: String,
    pub shape: Shape,
    pub text: String,
    pub segments: Option<Vec<Segment>>,
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    pub fetch_method: String,
    pub metadata: Option<VideoMetadata>,
    pub is_auto_generated: Option<bool>,
}

impl CacheEntry {
    /// Seconds since the entry was written, never negative.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.fetched_at).num_seconds().max(0)
    }
}

/// Input for [`CacheDb::put_transcript`].
#[derive(Debug, Clone)]
pub struct TranscriptRecord {
    pub video_id: String,
    pub language: String,
    pub shape: Shape,
    pub text: String,
    pub segments: Option<Vec<Segment>>,
    pub metadata: Option<VideoMetadata>,
    pub is_auto_generated: Option<bool>,
    pub fetch_method: String,
}

/// Row as stored, before JSON columns are decoded.
struct StoredRow {
    video_id: String,
    language: String,
    shape: String,
    text: String,
    content_hash: String,
    fetched_at: String,
    fetch_method: String,
    segments_json: Option<String>,
    metadata_json: Option<String>,
    is_auto_generated: Option<bool>,
}

impl TryFrom<StoredRow> for CacheEntry {
    type Error = Error;

    fn try_from(row: StoredRow) -> Result<Self, Error> {
        let shape = Shape::parse(&row.shape)
            .ok_or_else(|| Error::CorruptEntry(format!("unknown shape {}", row.shape)))?;
        let fetched_at = DateTime::parse_from_rfc3339(&row.fetched_at)
            .map_err(|e| Error::CorruptEntry(format!("fetched_at: {e}")))?
            .with_timezone(&Utc);
        let segments = row
            .segments_json
            .as_deref()
            .map(serde_json::from_str::<Vec<Segment>>)
            .transpose()
            .map_err(|e| Error::CorruptEntry(format!("segments_json: {e}")))?;
        let metadata = row
            .metadata_json
            .as_deref()
            .map(serde_json::from_str::<VideoMetadata>)
            .transpose()
            .map_err(|e| Error::CorruptEntry(format!("metadata_json: {e}")))?;

        Ok(CacheEntry {
            video_id: row.video_id,
            language: row.language,
            shape,
            text: row.text,
            segments,
            content_hash: row.content_hash,
            fetched_at,
            fetch_method: row.fetch_method,
            metadata,
            is_auto_generated: row.is_auto_generated,
        })
    }
}

impl CacheDb {
    /// Get a cached transcript by its composite key.
    ///
    /// Returns None if no entry exists.
    pub async fn get_transcript(
        &self, video_id: &str, language: &str, shape: Shape,
    ) -> Result<Option<CacheEntry>, Error> {
        let video_id = video_id.to_string();
        let language = language.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT
                    video_id, language, shape, text, content_hash, fetched_at, fetch_method,
                    segments_json, metadata_json, is_auto_generated
                FROM transcripts WHERE video_id = ?1 AND language = ?2 AND shape = ?3",
                )?;

                let result = stmt.query_row(params![video_id, language, shape.as_str()], |row| {
                    Ok(StoredRow {
                        video_id: row.get(0)?,
                        language: row.get(1)?,
                        shape: row.get(2)?,
                        text: row.get(3)?,
                        content_hash: row.get(4)?,
                        fetched_at: row.get(5)?,
                        fetch_method: row.get(6)?,
                        segments_json: row.get(7)?,
                        metadata_json: row.get(8)?,
                        is_auto_generated: row.get(9)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(CacheEntry::try_from).transpose()
    }

    /// Insert or replace a cached transcript.
    ///
    /// Stamps `fetched_at` with the current time and computes the content hash.
    /// Last write wins.
    pub async fn put_transcript(&self, record: TranscriptRecord) -> Result<CacheEntry, Error> {
        let entry = CacheEntry {
            content_hash: content_hash(&record.text),
            fetched_at: Utc::now(),
            video_id: record.video_id,
            language: record.language,
            shape: record.shape,
            text: record.text,
            segments: record.segments,
            fetch_method: record.fetch_method,
            metadata: record.metadata,
            is_auto_generated: record.is_auto_generated,
        };

        let segments_json = entry.segments.as_ref().map(serde_json::to_string).transpose()?;
        let metadata_json = entry.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let fetched_at = entry.fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let row = entry.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO transcripts (
                    video_id, language, shape, text, content_hash, fetched_at, fetch_method,
                    segments_json, metadata_json, is_auto_generated
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(video_id, language, shape) DO UPDATE SET
                    text = excluded.text,
                    content_hash = excluded.content_hash,
                    fetched_at = excluded.fetched_at,
                    fetch_method = excluded.fetch_method,
                    segments_json = excluded.segments_json,
                    metadata_json = excluded.metadata_json,
                    is_auto_generated = excluded.is_auto_generated",
                    params![
                        &row.video_id,
                        &row.language,
                        row.shape.as_str(),
                        &row.text,
                        &row.content_hash,
                        &fetched_at,
                        &row.fetch_method,
                        &segments_json,
                        &metadata_json,
                        &row.is_auto_generated,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(entry)
    }
}
