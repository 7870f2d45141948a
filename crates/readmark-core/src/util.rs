//! Small helpers shared by config, remote and storage code.

use chrono::{DateTime, Utc};

/// Trimmed text, or `None` for missing and blank values.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Whether `value` uses an `http` or `https` scheme.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// First 180 characters of `value`, for log lines quoting server bodies.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Stored Unix milliseconds as a UTC instant; out-of-range values map to the epoch.
pub fn from_timestamp_millis(value: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value).unwrap_or_default()
}
