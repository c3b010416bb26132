//! Video identifier resolution from URLs or bare ids.

/// Length of a canonical YouTube video id.
const VIDEO_ID_LEN: usize = 11;

/// Shortest path segment accepted by the fallback.
const MIN_FALLBACK_LEN: usize = 6;

/// Extract a video id from a URL or return a bare id unchanged.
///
/// Recognizes `watch?v=`, `youtu.be/` and `/shorts/` URLs. Anything else falls
/// back to the last path segment when it is at least six characters long.
pub fn extract_video_id(url_or_id: &str) -> String {
    let input = url_or_id.trim();

    if input.chars().count() == VIDEO_ID_LEN && !input.contains("://") && !input.contains('/') {
        return input.to_string();
    }

    let lower = input.to_lowercase();
    if lower.contains("youtube.com") || lower.contains("youtu.be") {
        if lower.contains("youtu.be/") {
            let tail = input.rsplit('/').next().unwrap_or(input);
            return strip_query(tail).to_string();
        }

        if lower.contains("/shorts/")
            && let Some((_, tail)) = split_once_ignore_case(input, "/shorts/")
        {
            return strip_query(tail).to_string();
        }

        if lower.contains("watch?") && lower.contains("v=") {
            let query = input.split_once('?').map(|(_, q)| q).unwrap_or(input);
            if let Some(id) = query.split('&').find_map(|part| part.strip_prefix("v=")) {
                return id.to_string();
            }
        }
    }

    if input.contains('/') {
        let candidate = input.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        if candidate.chars().count() >= MIN_FALLBACK_LEN {
            return candidate.to_string();
        }
    }

    input.to_string()
}

fn strip_query(s: &str) -> &str {
    s.split_once('?').map(|(head, _)| head).unwrap_or(s)
}

/// `split_once` on an ASCII needle, matching case-insensitively.
fn split_once_ignore_case<'a>(haystack: &'a str, needle: &str) -> Option<(&'a str, &'a str)> {
    let idx = haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())?;
    Some((&haystack[..idx], &haystack[idx + needle.len()..]))
}
