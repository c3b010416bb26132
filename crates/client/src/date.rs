//! Upload date normalization.

use chrono::NaiveDate;

/// Normalize an ISO-8601 date or timestamp to `YYYYMMDD`.
///
/// Accepts `2009-10-24`, `2009-10-24T23:57:33-07:00` and values already in
/// compact form.
pub fn compact_date(date: &str) -> Option<String> {
    let date = date.trim();
    if date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()) {
        return Some(date.to_string());
    }

    let day = date.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y%m%d").to_string())
}
