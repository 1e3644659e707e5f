//! Shared helpers: content hashing for change detection and filename date
//! extraction.

use chrono::NaiveDate;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Compute SHA-256 hash of content string, lowercase hex.
#[must_use]
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Truncated hash recorded inside generated-region markers. 16 hex chars is
/// plenty for hand-edit detection and keeps the marker line readable.
#[must_use]
pub fn short_content_hash(content: &str) -> String {
    let mut hash = compute_content_hash(content);
    hash.truncate(16);
    hash
}

static FILENAME_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());

/// Extract a `YYYY-MM-DD` calendar date from a file stem such as
/// `2025-01-15 dream journal`. Returns the first match that is a real date.
#[must_use]
pub fn date_from_file_stem(stem: &str) -> Option<NaiveDate> {
    for caps in FILENAME_DATE.captures_iter(stem) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    None
}
