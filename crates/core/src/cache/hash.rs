//! Content hashing for cached transcripts.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of transcript text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
